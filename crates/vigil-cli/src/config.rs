//! Engine configuration: `vigil.toml` layered with `VIGIL_*` env vars.

use std::{collections::HashMap, path::PathBuf};

use anyhow::Context as _;
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use vigil_core::{
  color::{ColorRegistry, Palette},
  filter::FacetSchema,
  metric::{MetricCatalog, MetricDefinition},
  series::{Dimension, SeriesSynthesizer},
};

fn default_page_size() -> usize { 20 }

fn default_date_role() -> String { "created".to_owned() }

/// The registry key for a chart name as typed on the command line.
pub fn chart_key(chart: &str) -> String { chart.to_lowercase() }

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  #[serde(default = "default_page_size")]
  pub page_size:  usize,
  /// Timestamp role used for date filtering and sorting.
  #[serde(default = "default_date_role")]
  pub date_role:  String,
  /// Fixed "now"; the local clock when unset.
  #[serde(default)]
  pub anchor:     Option<NaiveDateTime>,
  /// Declared facet names; every filter applies when unset.
  #[serde(default)]
  pub facets:     Option<Vec<String>>,
  #[serde(default)]
  pub metrics:    Vec<MetricDefinition>,
  /// Palette table per chart name. Names are case-insensitive; the config
  /// loader lowercases table keys.
  #[serde(default)]
  pub charts:     HashMap<String, Palette>,
  #[serde(default)]
  pub dimensions: Vec<Dimension>,
}

impl EngineConfig {
  /// Read the optional file at `path`, then apply `VIGIL_*` overrides.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("VIGIL").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise EngineConfig")
  }

  pub fn anchor(&self) -> NaiveDateTime {
    self.anchor.unwrap_or_else(|| Local::now().naive_local())
  }

  pub fn schema(&self) -> Option<FacetSchema> {
    self.facets.as_ref().map(|names| FacetSchema::declared(names))
  }

  pub fn catalog(&self) -> anyhow::Result<MetricCatalog> {
    MetricCatalog::from_definitions(self.metrics.iter().cloned())
      .context("invalid metric configuration")
  }

  pub fn registry(&self) -> anyhow::Result<ColorRegistry> {
    let palettes = self
      .charts
      .iter()
      .map(|(chart, palette)| (chart_key(chart), palette.clone()))
      .collect();
    ColorRegistry::with_palettes(palettes).context("invalid chart palette")
  }

  pub fn synthesizer(&self) -> anyhow::Result<SeriesSynthesizer> {
    SeriesSynthesizer::new(self.dimensions.iter().cloned())
      .context("invalid dimension configuration")
  }
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};
  use vigil_core::period::NamedPeriod;

  use super::*;

  fn from_toml(raw: &str) -> EngineConfig {
    Config::builder()
      .add_source(File::from_str(raw, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg.page_size, 20);
    assert_eq!(cfg.date_role, "created");
    assert!(cfg.anchor.is_none());
    assert!(cfg.schema().is_none());
    assert!(cfg.catalog().unwrap().is_empty());
  }

  #[test]
  fn full_file_builds_every_component() {
    let cfg = from_toml(
      r##"
      page_size = 50
      date_role = "reported"
      anchor = "2025-06-18T10:00:00"
      facets = ["status", "kind"]

      [[metrics]]
      name = "new_members"
      dimension_key = "members"
      current = 1200
      base_rate_per_day = 8.0
      scaling = { daily = 1.0, weekly = 7.0, monthly = 30.0, yearly = 365.0 }

      [[metrics]]
      name = "reports_hidden"
      dimension_key = "reports"
      base_rate_per_day = 3.0
      damping = 0.3
      scaling = { daily = 1.0, weekly = 7.0, monthly = 30.0, yearly = 365.0 }

      [charts.members]
      entries = [
        { dimension = "new_members", color = "#FF0000" },
        { dimension = "pc_visitors", color = "#0000FF" },
      ]
      overflow = ["#00FF00"]
      fallback = "#777777"

      [[dimensions]]
      name = "new_members"
      base_value = 100.0
      jitter = 0.25
      mode_factors = { reported = 0.5 }
      "##,
    );

    assert_eq!(cfg.page_size, 50);
    assert_eq!(cfg.date_role, "reported");
    assert_eq!(cfg.anchor().to_string(), "2025-06-18 10:00:00");
    assert!(cfg.schema().unwrap().knows("kind"));

    let catalog = cfg.catalog().unwrap();
    let weekly = catalog.snapshots(NamedPeriod::Weekly);
    assert_eq!(weekly[0].delta, 56);
    assert_eq!(weekly[1].delta, 6);

    let mut registry = cfg.registry().unwrap();
    assert_eq!(registry.assign("members", "pc_visitors").color, "#0000FF");

    let synth = cfg.synthesizer().unwrap();
    assert_eq!(synth.dimension("new_members").unwrap().jitter, 0.25);
  }

  #[test]
  fn chart_names_match_regardless_of_case() {
    let cfg = from_toml(
      r##"
      [charts.Members]
      entries = [{ dimension = "new_members", color = "#FF0000" }]
      fallback = "#777777"
      "##,
    );
    let mut registry = cfg.registry().unwrap();
    for typed in ["Members", "members", "MEMBERS"] {
      assert_eq!(registry.assign(&chart_key(typed), "new_members").color, "#FF0000");
    }
  }

  #[test]
  fn invalid_tables_surface_as_errors() {
    let cfg = from_toml(
      r#"
      [[dimensions]]
      name = "x"
      jitter = 0.9
      "#,
    );
    assert!(cfg.synthesizer().is_err());

    let cfg = from_toml(
      r#"
      [[metrics]]
      name = "m"
      dimension_key = "d"
      base_rate_per_day = 1.0
      "#,
    );
    assert!(cfg.catalog().is_err());
  }
}
