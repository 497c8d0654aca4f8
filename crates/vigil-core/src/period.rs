//! Named periods, their resolution into concrete ranges, and the
//! period/range selection state machine.
//!
//! List pages and the dashboard let the operator either pick a named period
//! ("weekly") or type an explicit date range. The two are coupled: picking a
//! period rewrites the range, and touching the range switches the period to
//! `custom`. [`PeriodSelection`] owns that coupling.

use chrono::{
  Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ─── NamedPeriod ─────────────────────────────────────────────────────────────

/// The closed vocabulary of period names.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NamedPeriod {
  Daily,
  Weekly,
  Monthly,
  Yearly,
  Custom,
}

impl NamedPeriod {
  /// The most buckets a chart draws for this period.
  pub fn bucket_cap(self) -> usize {
    match self {
      Self::Daily | Self::Custom => 30,
      Self::Weekly | Self::Monthly => 12,
      Self::Yearly => 5,
    }
  }
}

// ─── Ranges ──────────────────────────────────────────────────────────────────

/// A resolved `[start, end]` pair of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantRange {
  pub start: NaiveDateTime,
  pub end:   NaiveDateTime,
}

impl InstantRange {
  /// The calendar dates this range touches.
  pub fn dates(&self) -> DateRange {
    DateRange { start: self.start.date(), end: self.end.date() }
  }
}

/// An inclusive pair of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Self { Self { start, end } }

  pub fn single(day: NaiveDate) -> Self { Self { start: day, end: day } }

  pub fn is_well_ordered(&self) -> bool { self.start <= self.end }

  /// First and last instant covered: `start` from 00:00:00.000, `end`
  /// through 23:59:59.999.
  pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
    (self.start.and_time(NaiveTime::default()), end_of_day(self.end))
  }

  pub fn contains(&self, at: NaiveDateTime) -> bool {
    let (lo, hi) = self.bounds();
    lo <= at && at <= hi
  }

  /// Number of calendar days covered, or 0 for an inverted range.
  pub fn days(&self) -> i64 {
    if !self.is_well_ordered() {
      return 0;
    }
    (self.end - self.start).num_days() + 1
  }
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
  let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
  day.and_time(last)
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Resolve a named period into a concrete range ending at `anchor`.
///
/// `custom` returns `None`: the caller's explicit range is used verbatim.
/// Month and year arithmetic clamps to the end of shorter months.
pub fn resolve(period: NamedPeriod, anchor: NaiveDateTime) -> Option<InstantRange> {
  let start = match period {
    NamedPeriod::Daily => anchor,
    NamedPeriod::Weekly => anchor
      .checked_sub_signed(Duration::days(7))
      .unwrap_or(NaiveDateTime::MIN),
    NamedPeriod::Monthly => anchor
      .checked_sub_months(Months::new(1))
      .unwrap_or(NaiveDateTime::MIN),
    NamedPeriod::Yearly => anchor
      .checked_sub_months(Months::new(12))
      .unwrap_or(NaiveDateTime::MIN),
    NamedPeriod::Custom => return None,
  };
  Some(InstantRange { start, end: anchor })
}

/// Chart bucket boundaries for `period`, oldest first, the last bucket
/// containing `anchor`.
///
/// Daily (and custom) buckets are single days, weekly buckets are seven-day
/// windows ending on the anchor's weekday, monthly and yearly buckets are
/// calendar months and years. `count` is capped at
/// [`NamedPeriod::bucket_cap`].
pub fn bucket_ranges(
  period: NamedPeriod,
  anchor: NaiveDate,
  count: usize,
) -> Vec<DateRange> {
  let count = count.min(period.bucket_cap());
  (0..count)
    .rev()
    .filter_map(|back| bucket_back(period, anchor, back as u32))
    .collect()
}

fn bucket_back(period: NamedPeriod, anchor: NaiveDate, back: u32) -> Option<DateRange> {
  match period {
    NamedPeriod::Daily | NamedPeriod::Custom => {
      let day = anchor.checked_sub_signed(Duration::days(i64::from(back)))?;
      Some(DateRange::single(day))
    }
    NamedPeriod::Weekly => {
      let end = anchor.checked_sub_signed(Duration::weeks(i64::from(back)))?;
      let start = end.checked_sub_signed(Duration::days(6))?;
      Some(DateRange::new(start, end))
    }
    NamedPeriod::Monthly => {
      let start = anchor.with_day(1)?.checked_sub_months(Months::new(back))?;
      let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
      Some(DateRange::new(start, end))
    }
    NamedPeriod::Yearly => {
      let year = anchor.year().checked_sub(back as i32)?;
      Some(DateRange::new(
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
      ))
    }
  }
}

// ─── Selection state machine ─────────────────────────────────────────────────

/// An edit to one endpoint of the explicit range. `None` clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "endpoint", content = "date", rename_all = "snake_case")]
pub enum RangeEdit {
  Start(Option<NaiveDate>),
  End(Option<NaiveDate>),
}

/// An operator action on the period controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
  SelectPeriod {
    period: NamedPeriod,
    anchor: NaiveDateTime,
  },
  EditRange(RangeEdit),
}

/// The period control state of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PeriodSelection {
  /// A named period with the range the resolver computed for it.
  Named {
    period: NamedPeriod,
    range:  DateRange,
  },
  /// An explicit range; either endpoint may be unset while editing.
  Custom {
    start: Option<NaiveDate>,
    end:   Option<NaiveDate>,
  },
}

impl Default for PeriodSelection {
  fn default() -> Self { Self::Custom { start: None, end: None } }
}

impl PeriodSelection {
  /// Start from `period` resolved at `anchor`.
  pub fn named(period: NamedPeriod, anchor: NaiveDateTime) -> Self {
    Self::default().transition(SelectionEvent::SelectPeriod { period, anchor })
  }

  /// Start from an explicit range.
  pub fn custom(range: DateRange) -> Self {
    Self::Custom { start: Some(range.start), end: Some(range.end) }
  }

  /// The single transition function.
  ///
  /// Selecting a named period overwrites the range with the resolver's
  /// output. Selecting `custom` keeps the current endpoints verbatim. Any
  /// endpoint edit lands in `Custom`.
  pub fn transition(self, event: SelectionEvent) -> Self {
    match event {
      SelectionEvent::SelectPeriod { period, anchor } => {
        match resolve(period, anchor) {
          Some(resolved) => Self::Named { period, range: resolved.dates() },
          None => {
            let (start, end) = self.endpoints();
            Self::Custom { start, end }
          }
        }
      }
      SelectionEvent::EditRange(edit) => {
        let (mut start, mut end) = self.endpoints();
        match edit {
          RangeEdit::Start(d) => start = d,
          RangeEdit::End(d) => end = d,
        }
        Self::Custom { start, end }
      }
    }
  }

  pub fn select_period(&mut self, period: NamedPeriod, anchor: NaiveDateTime) {
    *self = self.transition(SelectionEvent::SelectPeriod { period, anchor });
  }

  pub fn edit_range(&mut self, edit: RangeEdit) {
    *self = self.transition(SelectionEvent::EditRange(edit));
  }

  pub fn period(&self) -> NamedPeriod {
    match self {
      Self::Named { period, .. } => *period,
      Self::Custom { .. } => NamedPeriod::Custom,
    }
  }

  /// The explicit endpoints as the date inputs would display them.
  pub fn endpoints(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match self {
      Self::Named { range, .. } => (Some(range.start), Some(range.end)),
      Self::Custom { start, end } => (*start, *end),
    }
  }

  /// The range to filter by, or `None` for "no constraint" (a missing
  /// endpoint or `start > end`).
  pub fn effective_range(&self) -> Option<DateRange> {
    match self.endpoints() {
      (Some(start), Some(end)) if start <= end => Some(DateRange { start, end }),
      _ => None,
    }
  }
}
