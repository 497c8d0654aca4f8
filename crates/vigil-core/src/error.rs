//! Error types for `vigil-core`.
//!
//! Queries never fail on data shape; these variants are only produced while
//! building engine configuration (metric catalogs, palettes, dimensions).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("metric {0:?} has no scaling table")]
  MissingScaling(String),

  #[error("metric {metric:?}: daily multiplier must be 1, got {got}")]
  DailyMultiplier { metric: String, got: f64 },

  #[error("metric {metric:?}: {period} multiplier {value} is not a finite non-negative number")]
  InvalidMultiplier {
    metric: String,
    period: &'static str,
    value:  f64,
  },

  #[error("metric {metric:?}: base rate {value} is not a finite number")]
  InvalidBaseRate { metric: String, value: f64 },

  #[error("duplicate metric name: {0:?}")]
  DuplicateMetric(String),

  #[error("dimension {dimension:?}: jitter ratio {value} is outside 0.2..=0.4")]
  JitterOutOfRange { dimension: String, value: f64 },

  #[error("dimension {dimension:?}: base value {value} is not a finite non-negative number")]
  InvalidBaseValue { dimension: String, value: f64 },

  #[error("chart {0:?} palette has no fallback color")]
  EmptyPalette(String),

  #[error("chart {chart:?} lists dimension {dimension:?} twice")]
  DuplicatePaletteEntry { chart: String, dimension: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
