//! The compact domain timestamp codec.
//!
//! Every record source in the backoffice stamps its rows as
//! `YY.MM.DD. HH:MM:SS` (e.g. `25.06.18. 06:32:17`), where `YY` is the
//! calendar year minus 2000. This module is the only place that pattern is
//! parsed or produced.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Byte length of a well-formed compact timestamp.
pub const COMPACT_LEN: usize = 18;

const YEAR_BASE: i32 = 2000;

// ─── Stamp ───────────────────────────────────────────────────────────────────

/// The result of parsing a compact timestamp.
///
/// `Unparseable` orders below every parsed instant, so a descending sort
/// places malformed rows at the tail.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Stamp {
  Unparseable,
  At(NaiveDateTime),
}

impl Stamp {
  pub fn instant(&self) -> Option<NaiveDateTime> {
    match self {
      Self::At(at) => Some(*at),
      Self::Unparseable => None,
    }
  }

  pub fn is_parsed(&self) -> bool { matches!(self, Self::At(_)) }
}

impl fmt::Display for Stamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.instant().and_then(format) {
      Some(s) => f.write_str(&s),
      None => f.write_str("<unparseable>"),
    }
  }
}

// ─── Codec ───────────────────────────────────────────────────────────────────

/// Parse a compact timestamp.
///
/// The match is strict: exact width, two-digit zero-padded fields, literal
/// `.`/`.`/`. `/`:`/`:` separators and a real calendar date and clock time.
/// Anything else is [`Stamp::Unparseable`]; this function never panics.
pub fn parse(compact: &str) -> Stamp {
  parse_strict(compact.as_bytes()).map_or(Stamp::Unparseable, Stamp::At)
}

/// Format an instant as a compact timestamp.
///
/// Returns `None` for instants outside 2000–2099, which the two-digit year
/// cannot represent. Sub-second precision is dropped.
pub fn format(at: NaiveDateTime) -> Option<String> {
  let yy = at.year() - YEAR_BASE;
  if !(0..=99).contains(&yy) {
    return None;
  }
  Some(format!(
    "{yy:02}.{:02}.{:02}. {:02}:{:02}:{:02}",
    at.month(),
    at.day(),
    at.hour(),
    at.minute(),
    at.second(),
  ))
}

fn parse_strict(b: &[u8]) -> Option<NaiveDateTime> {
  if b.len() != COMPACT_LEN {
    return None;
  }
  let separators = [(2, b'.'), (5, b'.'), (8, b'.'), (9, b' '), (12, b':'), (15, b':')];
  if separators.iter().any(|&(i, c)| b[i] != c) {
    return None;
  }

  let yy = two_digits(b, 0)?;
  let month = two_digits(b, 3)?;
  let day = two_digits(b, 6)?;
  let hour = two_digits(b, 10)?;
  let minute = two_digits(b, 13)?;
  let second = two_digits(b, 16)?;

  NaiveDate::from_ymd_opt(YEAR_BASE + yy as i32, month, day)?
    .and_hms_opt(hour, minute, second)
}

fn two_digits(b: &[u8], at: usize) -> Option<u32> {
  let (hi, lo) = (b[at], b[at + 1]);
  if !hi.is_ascii_digit() || !lo.is_ascii_digit() {
    return None;
  }
  Some(u32::from(hi - b'0') * 10 + u32::from(lo - b'0'))
}
