//! `vigil`: run the dashboard engine against a local record snapshot.
//!
//! Reads `vigil.toml` (or the path given with `--config`), layers `VIGIL_*`
//! environment variables on top, runs one operation and prints JSON to
//! stdout. Logs go to stderr.
//!
//! ```
//! vigil query records.json --period weekly --facet status=open --page 2
//! vigil snapshot --period monthly
//! vigil series --chart members -d new_members -d pc_visitors --mode cumulative
//! vigil parse "25.06.18. 09:00:00"
//! ```

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vigil_core::{filter::FacetFilter, period::NamedPeriod, series::ChartMode};

use crate::{
  commands::{QueryArgs, SeriesArgs},
  config::EngineConfig,
};

#[derive(Parser)]
#[command(author, version, about = "Vigil moderation dashboard engine")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "vigil.toml")]
  config: PathBuf,

  /// Pretty-print JSON output.
  #[arg(long)]
  pretty: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Filter, sort and page a record snapshot.
  Query {
    /// JSON array of records.
    records: PathBuf,

    /// Case-insensitive substring over text fields.
    #[arg(short, long, default_value = "")]
    search: String,

    /// Facet filter as NAME=VALUE; VALUE `ALL` matches anything.
    #[arg(short, long = "facet", value_parser = commands::parse_facet)]
    facets: Vec<(String, FacetFilter)>,

    /// Named period resolved against the configured anchor.
    #[arg(short, long)]
    period: Option<NamedPeriod>,

    /// Explicit range start (YYYY-MM-DD); switches to a custom range.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Explicit range end (YYYY-MM-DD); switches to a custom range.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// 1-based page index.
    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long)]
    page_size: Option<usize>,

    /// Timestamp role to filter and sort by.
    #[arg(long)]
    role: Option<String>,
  },

  /// Print every configured metric for a period.
  Snapshot {
    #[arg(short, long, default_value = "daily")]
    period: NamedPeriod,
  },

  /// Build chart series for the selected dimensions.
  Series {
    /// Chart name, matched case-insensitively against `[charts.*]`.
    #[arg(short, long)]
    chart: String,

    #[arg(short, long = "dimension", required = true)]
    dimensions: Vec<String>,

    #[arg(short, long, default_value = "daily")]
    period: NamedPeriod,

    #[arg(short, long, value_enum, default_value_t = Mode::Cumulative)]
    mode: Mode,

    /// Event kind plotted in delta mode.
    #[arg(long, default_value = "new")]
    sub_mode: String,

    /// Number of buckets; the period's cap when omitted.
    #[arg(long)]
    buckets: Option<usize>,

    /// Seed for modelled values.
    #[arg(long, env = "VIGIL_SEED")]
    seed: Option<u64>,

    /// Count records from this snapshot instead of modelling values.
    #[arg(long)]
    records: Option<PathBuf>,
  },

  /// Check compact timestamps (`YY.MM.DD. HH:MM:SS`).
  Parse {
    #[arg(required = true)]
    stamps: Vec<String>,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
  Cumulative,
  Delta,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = EngineConfig::load(cli.config)?;

  match cli.command {
    Command::Query { records, search, facets, period, start, end, page, page_size, role } => {
      let records = commands::load_records(&records)?;
      let selection = commands::selection(period, start, end, cfg.anchor());
      let report = commands::query(&cfg, &records, QueryArgs {
        search,
        facets,
        selection,
        page,
        page_size,
        role,
      });
      emit(&report, cli.pretty)
    }
    Command::Snapshot { period } => emit(&commands::snapshot(&cfg, period)?, cli.pretty),
    Command::Series { chart, dimensions, period, mode, sub_mode, buckets, seed, records } => {
      let records = records.map(|p| commands::load_records(&p)).transpose()?;
      let mode = match mode {
        Mode::Cumulative => ChartMode::Cumulative,
        Mode::Delta => ChartMode::Delta(sub_mode),
      };
      let set = commands::series(&cfg, SeriesArgs {
        chart,
        dimensions,
        period,
        mode,
        buckets,
        seed,
        records,
      })?;
      emit(&set, cli.pretty)
    }
    Command::Parse { stamps } => emit(&commands::parse(stamps), cli.pretty),
  }
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
  let out = if pretty {
    serde_json::to_string_pretty(value)
  } else {
    serde_json::to_string(value)
  }
  .context("failed to serialise output")?;
  println!("{out}");
  Ok(())
}
