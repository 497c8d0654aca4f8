//! Dashboard metric snapshots: a cumulative value plus a period delta.
//!
//! The delta is modelled, not counted: `round(base_rate_per_day ×
//! multiplier[period])`. Multipliers live in an explicit [`ScalingRule`]
//! table so they can be inspected and tested on their own. Rarer event
//! types scale sub-linearly through a per-metric damping factor, which is
//! configuration, not code.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, period::NamedPeriod};

// ─── Scaling ─────────────────────────────────────────────────────────────────

/// Per-period multipliers applied to a metric's daily base rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingRule {
  pub daily:   f64,
  pub weekly:  f64,
  pub monthly: f64,
  pub yearly:  f64,
}

impl ScalingRule {
  /// Calendar-length multipliers: 1, 7, 30, 365.
  pub const LINEAR: Self =
    Self { daily: 1.0, weekly: 7.0, monthly: 30.0, yearly: 365.0 };

  pub fn new(weekly: f64, monthly: f64, yearly: f64) -> Self {
    Self { daily: 1.0, weekly, monthly, yearly }
  }

  /// Scale the weekly, monthly and yearly multipliers by `factor`. The daily
  /// multiplier stays 1.
  pub fn damped(self, factor: f64) -> Self {
    Self {
      daily:   self.daily,
      weekly:  self.weekly * factor,
      monthly: self.monthly * factor,
      yearly:  self.yearly * factor,
    }
  }

  /// The multiplier for `period`. `custom` uses the daily multiplier.
  pub fn multiplier(&self, period: NamedPeriod) -> f64 {
    match period {
      NamedPeriod::Daily | NamedPeriod::Custom => self.daily,
      NamedPeriod::Weekly => self.weekly,
      NamedPeriod::Monthly => self.monthly,
      NamedPeriod::Yearly => self.yearly,
    }
  }

  fn validate(&self, metric: &str) -> Result<()> {
    if self.daily != 1.0 {
      return Err(Error::DailyMultiplier { metric: metric.to_owned(), got: self.daily });
    }
    for (period, value) in [
      ("weekly", self.weekly),
      ("monthly", self.monthly),
      ("yearly", self.yearly),
    ] {
      check_multiplier(metric, period, value)?;
    }
    Ok(())
  }
}

fn check_multiplier(metric: &str, period: &'static str, value: f64) -> Result<()> {
  if value.is_finite() && value >= 0.0 {
    Ok(())
  } else {
    Err(Error::InvalidMultiplier { metric: metric.to_owned(), period, value })
  }
}

// ─── Metric ──────────────────────────────────────────────────────────────────

/// A metric as supplied by the metric source (configuration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
  pub name:              String,
  /// The chart dimension this metric feeds.
  pub dimension_key:     String,
  /// The cumulative value, known ahead of time.
  #[serde(default)]
  pub current:           i64,
  pub base_rate_per_day: f64,
  pub scaling:           Option<ScalingRule>,
  /// Extra factor on the non-daily multipliers. Defaults to 1.
  #[serde(default = "default_damping")]
  pub damping:           f64,
}

fn default_damping() -> f64 { 1.0 }

/// A validated metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
  pub name:              String,
  pub dimension_key:     String,
  pub current:           i64,
  pub base_rate_per_day: f64,
  /// The effective table, damping already applied.
  pub scaling:           ScalingRule,
}

impl TryFrom<MetricDefinition> for Metric {
  type Error = Error;

  fn try_from(def: MetricDefinition) -> Result<Self> {
    let scaling = def
      .scaling
      .ok_or_else(|| Error::MissingScaling(def.name.clone()))?;
    scaling.validate(&def.name)?;
    check_multiplier(&def.name, "damping", def.damping)?;
    if !def.base_rate_per_day.is_finite() {
      return Err(Error::InvalidBaseRate { metric: def.name, value: def.base_rate_per_day });
    }

    Ok(Self {
      scaling: scaling.damped(def.damping),
      name: def.name,
      dimension_key: def.dimension_key,
      current: def.current,
      base_rate_per_day: def.base_rate_per_day,
    })
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Which way a delta points; `Flat` means the UI shows no indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
  Up,
  Down,
  Flat,
}

/// A metric's value for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub metric:  String,
  pub period:  NamedPeriod,
  pub current: i64,
  pub delta:   i64,
}

impl Snapshot {
  pub fn trend(&self) -> Trend {
    match self.delta.signum() {
      1 => Trend::Up,
      -1 => Trend::Down,
      _ => Trend::Flat,
    }
  }
}

/// `delta = round(base_rate_per_day × multiplier[period])`, rounding half
/// away from zero.
pub fn snapshot(metric: &Metric, period: NamedPeriod) -> Snapshot {
  let raw = metric.base_rate_per_day * metric.scaling.multiplier(period);
  Snapshot {
    metric: metric.name.clone(),
    period,
    current: metric.current,
    delta: raw.round() as i64,
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// The validated set of dashboard metrics, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricCatalog {
  metrics: Vec<Metric>,
}

impl MetricCatalog {
  /// Validate every definition. Any configuration error fails the whole
  /// catalog, so a bad table is caught at startup rather than per query.
  pub fn from_definitions(
    definitions: impl IntoIterator<Item = MetricDefinition>,
  ) -> Result<Self> {
    let mut seen = HashSet::new();
    let mut metrics = Vec::new();
    for def in definitions {
      if !seen.insert(def.name.clone()) {
        return Err(Error::DuplicateMetric(def.name));
      }
      metrics.push(Metric::try_from(def)?);
    }
    Ok(Self { metrics })
  }

  pub fn get(&self, name: &str) -> Option<&Metric> {
    self.metrics.iter().find(|m| m.name == name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Metric> { self.metrics.iter() }

  pub fn len(&self) -> usize { self.metrics.len() }

  pub fn is_empty(&self) -> bool { self.metrics.is_empty() }

  /// Snapshots for every metric, in catalog order.
  pub fn snapshots(&self, period: NamedPeriod) -> Vec<Snapshot> {
    self.metrics.iter().map(|m| snapshot(m, period)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn def(name: &str, base: f64, scaling: Option<ScalingRule>) -> MetricDefinition {
    MetricDefinition {
      name: name.into(),
      dimension_key: format!("{name}_dim"),
      current: 1_000,
      base_rate_per_day: base,
      scaling,
      damping: 1.0,
    }
  }

  #[test]
  fn weekly_delta_of_base_eight_is_fifty_six() {
    let m = Metric::try_from(def("members", 8.0, Some(ScalingRule::LINEAR))).unwrap();
    let s = snapshot(&m, NamedPeriod::Weekly);
    assert_eq!(s.delta, 56);
    assert_eq!(s.current, 1_000);
    assert_eq!(s.trend(), Trend::Up);
  }

  #[test]
  fn every_period_uses_its_multiplier() {
    let m = Metric::try_from(def("posts", 3.0, Some(ScalingRule::LINEAR))).unwrap();
    let deltas: Vec<i64> = [
      NamedPeriod::Daily,
      NamedPeriod::Weekly,
      NamedPeriod::Monthly,
      NamedPeriod::Yearly,
      NamedPeriod::Custom,
    ]
    .into_iter()
    .map(|p| snapshot(&m, p).delta)
    .collect();
    assert_eq!(deltas, [3, 21, 90, 1095, 3]);
  }

  #[test]
  fn damping_leaves_daily_untouched() {
    let mut d = def("reports", 10.0, Some(ScalingRule::LINEAR));
    d.damping = 0.8;
    let m = Metric::try_from(d).unwrap();
    assert_eq!(m.scaling.daily, 1.0);
    assert_eq!(snapshot(&m, NamedPeriod::Daily).delta, 10);
    assert_eq!(snapshot(&m, NamedPeriod::Weekly).delta, 56);
    assert_eq!(snapshot(&m, NamedPeriod::Monthly).delta, 240);
  }

  #[test]
  fn zero_delta_is_flat() {
    let m = Metric::try_from(def("popups", 0.2, Some(ScalingRule::LINEAR))).unwrap();
    let s = snapshot(&m, NamedPeriod::Daily);
    assert_eq!(s.delta, 0);
    assert_eq!(s.trend(), Trend::Flat);
  }

  #[test]
  fn rounding_is_half_away_from_zero() {
    let m = Metric::try_from(def("a", 0.5, Some(ScalingRule::LINEAR))).unwrap();
    assert_eq!(snapshot(&m, NamedPeriod::Daily).delta, 1);
    let m = Metric::try_from(def("b", -0.5, Some(ScalingRule::LINEAR))).unwrap();
    assert_eq!(snapshot(&m, NamedPeriod::Daily).delta, -1);
    assert_eq!(snapshot(&m, NamedPeriod::Daily).trend(), Trend::Down);
  }

  #[test]
  fn missing_scaling_fails_at_construction() {
    let err = Metric::try_from(def("votes", 1.0, None)).unwrap_err();
    assert!(matches!(err, Error::MissingScaling(name) if name == "votes"));
  }

  #[test]
  fn non_unit_daily_multiplier_is_rejected() {
    let bad = ScalingRule { daily: 2.0, ..ScalingRule::LINEAR };
    let err = Metric::try_from(def("votes", 1.0, Some(bad))).unwrap_err();
    assert!(matches!(err, Error::DailyMultiplier { .. }));
  }

  #[test]
  fn negative_or_nan_multipliers_are_rejected() {
    let bad = ScalingRule::new(-7.0, 30.0, 365.0);
    assert!(Metric::try_from(def("x", 1.0, Some(bad))).is_err());
    let bad = ScalingRule::new(7.0, f64::NAN, 365.0);
    assert!(Metric::try_from(def("x", 1.0, Some(bad))).is_err());
    let mut d = def("x", 1.0, Some(ScalingRule::LINEAR));
    d.damping = -1.0;
    assert!(matches!(
      Metric::try_from(d).unwrap_err(),
      Error::InvalidMultiplier { period: "damping", .. }
    ));
  }

  #[test]
  fn catalog_rejects_duplicates_and_keeps_order() {
    let err = MetricCatalog::from_definitions([
      def("a", 1.0, Some(ScalingRule::LINEAR)),
      def("a", 2.0, Some(ScalingRule::LINEAR)),
    ])
    .unwrap_err();
    assert!(matches!(err, Error::DuplicateMetric(_)));

    let catalog = MetricCatalog::from_definitions([
      def("b", 1.0, Some(ScalingRule::LINEAR)),
      def("a", 2.0, Some(ScalingRule::LINEAR)),
    ])
    .unwrap();
    let names: Vec<_> = catalog.snapshots(NamedPeriod::Daily).into_iter().map(|s| s.metric).collect();
    assert_eq!(names, ["b", "a"]);
    assert_eq!(catalog.get("a").unwrap().base_rate_per_day, 2.0);
  }

  #[test]
  fn definitions_deserialize_from_config_shape() {
    let d: MetricDefinition = serde_json::from_value(serde_json::json!({
      "name": "reports",
      "dimension_key": "reports_new",
      "base_rate_per_day": 4.0,
      "scaling": { "daily": 1.0, "weekly": 7.0, "monthly": 30.0, "yearly": 365.0 },
      "damping": 0.5
    }))
    .unwrap();
    assert_eq!(d.current, 0);
    let m = Metric::try_from(d).unwrap();
    assert_eq!(snapshot(&m, NamedPeriod::Weekly).delta, 14);
  }
}
