//! Time-series synthesis for dashboard charts.
//!
//! A chart shows one series per selected dimension over period-dependent
//! buckets. Bucket boundaries come from [`period::bucket_ranges`]; bucket
//! values come from a [`BucketSource`], either modelled ([`JitterSource`])
//! or counted from records ([`RecordCountSource`]). Colors come from the
//! caller's [`ColorRegistry`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Result,
  color::{ColorRegistry, Slot},
  filter::{DateVerdict, FacetFilter},
  period::{self, DateRange, NamedPeriod},
  record::Record,
};

/// Jitter ratio for dimensions without configuration.
pub const DEFAULT_JITTER: f64 = 0.3;

// ─── Selection ───────────────────────────────────────────────────────────────

/// Whether a chart plots running totals or per-bucket changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "sub_mode", rename_all = "snake_case")]
pub enum ChartMode {
  Cumulative,
  /// Per-bucket change of one event kind, e.g. `"new"`, `"reported"`,
  /// `"hidden"`, `"deleted"`.
  Delta(String),
}

/// What the operator has selected on a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
  pub selected: BTreeSet<String>,
  pub period:   NamedPeriod,
  pub mode:     ChartMode,
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// One selectable chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
  pub name:         String,
  /// Typical per-bucket value for modelled data.
  #[serde(default)]
  pub base_value:   f64,
  /// Half-width of the uniform jitter, as a fraction of the base.
  #[serde(default = "default_jitter")]
  pub jitter:       f64,
  /// Scale applied in `Delta(sub_mode)` charts; missing sub-modes use 1.
  #[serde(default)]
  pub mode_factors: BTreeMap<String, f64>,
  /// Facet predicate selecting this dimension's records when counting.
  #[serde(default)]
  pub facets:       BTreeMap<String, FacetFilter>,
}

fn default_jitter() -> f64 { DEFAULT_JITTER }

impl Dimension {
  pub fn new(name: impl Into<String>, base_value: f64) -> Self {
    Self {
      name: name.into(),
      base_value,
      jitter: DEFAULT_JITTER,
      mode_factors: BTreeMap::new(),
      facets: BTreeMap::new(),
    }
  }

  pub fn with_mode_factor(mut self, sub_mode: impl Into<String>, factor: f64) -> Self {
    self.mode_factors.insert(sub_mode.into(), factor);
    self
  }

  pub fn with_facet(mut self, name: impl Into<String>, filter: FacetFilter) -> Self {
    self.facets.insert(name.into(), filter);
    self
  }

  pub fn validate(&self) -> Result<()> {
    if !(0.2..=0.4).contains(&self.jitter) {
      return Err(Error::JitterOutOfRange {
        dimension: self.name.clone(),
        value:     self.jitter,
      });
    }
    let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
    if !finite_non_negative(self.base_value) {
      return Err(Error::InvalidBaseValue {
        dimension: self.name.clone(),
        value:     self.base_value,
      });
    }
    if let Some((_, &bad)) = self.mode_factors.iter().find(|(_, f)| !finite_non_negative(**f)) {
      return Err(Error::InvalidBaseValue { dimension: self.name.clone(), value: bad });
    }
    Ok(())
  }

  fn mode_factor(&self, mode: &ChartMode) -> f64 {
    match mode {
      ChartMode::Cumulative => 1.0,
      ChartMode::Delta(sub) => self.mode_factors.get(sub).copied().unwrap_or(1.0),
    }
  }

  fn admits(&self, record: &Record) -> bool {
    self
      .facets
      .iter()
      .all(|(name, filter)| filter.admits(record.facet(name)))
  }
}

// ─── Buckets ─────────────────────────────────────────────────────────────────

/// One labelled time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
  pub label: String,
  pub range: DateRange,
}

/// Labelled buckets for `period`, oldest first.
///
/// Labels: daily and weekly `MM/DD` (weekly shows the week's first day),
/// monthly `YYYY-MM`, yearly `YYYY`.
pub fn buckets(period: NamedPeriod, anchor: NaiveDate, count: usize) -> Vec<Bucket> {
  let pattern = match period {
    NamedPeriod::Daily | NamedPeriod::Custom | NamedPeriod::Weekly => "%m/%d",
    NamedPeriod::Monthly => "%Y-%m",
    NamedPeriod::Yearly => "%Y",
  };
  period::bucket_ranges(period, anchor, count)
    .into_iter()
    .map(|range| Bucket { label: range.start.format(pattern).to_string(), range })
    .collect()
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Produces one value per bucket for a dimension.
pub trait BucketSource {
  fn values(
    &mut self,
    dimension: &Dimension,
    mode: &ChartMode,
    buckets: &[Bucket],
  ) -> Vec<u64>;
}

/// Modelled data: each bucket is the base value with uniform jitter of
/// ±`jitter`, never negative. Cumulative charts plot the running sum.
#[derive(Debug)]
pub struct JitterSource<R> {
  rng: R,
}

impl<R: Rng> JitterSource<R> {
  pub fn new(rng: R) -> Self { Self { rng } }
}

impl<R: Rng> BucketSource for JitterSource<R> {
  fn values(
    &mut self,
    dimension: &Dimension,
    mode: &ChartMode,
    buckets: &[Bucket],
  ) -> Vec<u64> {
    let base = dimension.base_value * dimension.mode_factor(mode);
    let spread = dimension.jitter.abs();
    let steps = buckets.iter().map(|_| {
      let u: f64 = self.rng.gen_range(-spread..=spread);
      (base * (1.0 + u)).max(0.0).round() as u64
    });
    accumulate(steps, mode)
  }
}

/// Real data: counts records whose active timestamp falls inside each
/// bucket and whose facets satisfy the dimension's predicate.
///
/// Records with unparseable timestamps cannot be placed in a bucket and are
/// skipped. Sub-mode factors do not apply; select the event kind through
/// the dimension's facets instead.
#[derive(Debug, Clone)]
pub struct RecordCountSource<'a> {
  records:   &'a [Record],
  date_role: String,
}

impl<'a> RecordCountSource<'a> {
  pub fn new(records: &'a [Record], date_role: impl Into<String>) -> Self {
    Self { records, date_role: date_role.into() }
  }
}

impl BucketSource for RecordCountSource<'_> {
  fn values(
    &mut self,
    dimension: &Dimension,
    mode: &ChartMode,
    buckets: &[Bucket],
  ) -> Vec<u64> {
    let mut counts = vec![0u64; buckets.len()];
    let mut unplaced = 0usize;
    for record in self.records.iter().filter(|r| dimension.admits(r)) {
      let stamp = record.stamp(&self.date_role);
      if !stamp.is_parsed() {
        unplaced += 1;
        continue;
      }
      if let Some(i) = buckets
        .iter()
        .position(|b| DateVerdict::evaluate(stamp, Some(&b.range)) == DateVerdict::Inside)
      {
        counts[i] += 1;
      }
    }
    if unplaced > 0 {
      debug!(dimension = %dimension.name, unplaced, "records without a usable timestamp left out of chart");
    }
    accumulate(counts, mode)
  }
}

fn accumulate(steps: impl IntoIterator<Item = u64>, mode: &ChartMode) -> Vec<u64> {
  match mode {
    ChartMode::Delta(_) => steps.into_iter().collect(),
    ChartMode::Cumulative => steps
      .into_iter()
      .scan(0u64, |total, v| {
        *total = total.saturating_add(v);
        Some(*total)
      })
      .collect(),
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// One plotted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
  pub dimension: String,
  pub color:     String,
  pub values:    Vec<u64>,
}

/// Everything a chart needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSet {
  pub labels:     Vec<String>,
  pub series:     Vec<Series>,
  /// `ceil(max value × 1.2)` over every visible series; 0 when empty.
  pub y_axis_max: u64,
}

/// Upper bound for the y axis: `ceil(max × 1.2)`.
pub fn y_axis_max<'a>(series: impl IntoIterator<Item = &'a Series>) -> u64 {
  let max = series
    .into_iter()
    .flat_map(|s| s.values.iter().copied())
    .max()
    .unwrap_or(0);
  // ceil(max * 6 / 5) in integers.
  max.saturating_mul(6).saturating_add(4) / 5
}

// ─── Synthesizer ─────────────────────────────────────────────────────────────

/// Builds chart data for configured dimensions.
#[derive(Debug, Clone, Default)]
pub struct SeriesSynthesizer {
  dimensions: BTreeMap<String, Dimension>,
}

impl SeriesSynthesizer {
  pub fn new(dimensions: impl IntoIterator<Item = Dimension>) -> Result<Self> {
    let mut map = BTreeMap::new();
    for dim in dimensions {
      dim.validate()?;
      map.insert(dim.name.clone(), dim);
    }
    Ok(Self { dimensions: map })
  }

  pub fn dimension(&self, name: &str) -> Option<&Dimension> { self.dimensions.get(name) }

  /// Build the series for `spec` on `chart`, ending at `anchor`.
  ///
  /// Series are ordered by color slot (palette order first, then
  /// overflow assignments, then name), so neither the order dimensions were
  /// toggled in nor the iteration order of `spec.selected` affects the
  /// result. Unconfigured dimensions plot with a zero base.
  pub fn synthesize<S: BucketSource>(
    &self,
    registry: &mut ColorRegistry,
    source: &mut S,
    chart: &str,
    spec: &SeriesSpec,
    anchor: NaiveDate,
    bucket_count: usize,
  ) -> SeriesSet {
    let buckets = buckets(spec.period, anchor, bucket_count);

    let mut plotted: Vec<(Slot, Series)> = spec
      .selected
      .iter()
      .map(|name| {
        let fallback;
        let dim = match self.dimensions.get(name) {
          Some(d) => d,
          None => {
            debug!(chart, dimension = %name, "unconfigured dimension selected");
            fallback = Dimension::new(name.clone(), 0.0);
            &fallback
          }
        };
        let assigned = registry.assign(chart, name);
        let series = Series {
          dimension: name.clone(),
          color:     assigned.color,
          values:    source.values(dim, &spec.mode, &buckets),
        };
        (assigned.slot, series)
      })
      .collect();
    plotted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.dimension.cmp(&b.1.dimension)));

    let series: Vec<Series> = plotted.into_iter().map(|(_, s)| s).collect();
    let y_axis_max = y_axis_max(&series);
    debug!(
      chart,
      period = %spec.period,
      buckets = buckets.len(),
      series = series.len(),
      y_axis_max,
      "series synthesized"
    );

    SeriesSet {
      labels: buckets.into_iter().map(|b| b.label).collect(),
      series,
      y_axis_max,
    }
  }
}
