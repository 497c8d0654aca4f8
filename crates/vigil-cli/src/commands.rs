//! One function per subcommand. Each returns a serializable report so the
//! binary only has to print it.

use std::path::Path;

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveDateTime};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use vigil_core::{
  filter::{FacetFilter, Filters},
  fingerprint::QueryFingerprint,
  metric::{Snapshot, Trend},
  page::{Page, page},
  period::{DateRange, NamedPeriod, PeriodSelection, RangeEdit},
  query::{self, QueryRequest},
  record::{self, Record},
  series::{ChartMode, JitterSource, RecordCountSource, SeriesSet, SeriesSpec},
  timestamp::{self, Stamp},
};

use crate::config::{EngineConfig, chart_key};

/// Version stamp for snapshots loaded from disk; one load, one version.
/// Reported with the fingerprint so callers can key their own caches.
const SNAPSHOT_VERSION: u64 = 1;

pub fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading record snapshot {}", path.display()))?;
  let records = record::from_json(&raw).context("parsing record snapshot")?;
  tracing::info!(count = records.len(), path = %path.display(), "loaded records");
  Ok(records)
}

/// Parse a `--facet name=value` flag. `ALL` as the value matches anything.
pub fn parse_facet(raw: &str) -> Result<(String, FacetFilter), String> {
  let (name, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
  if name.is_empty() {
    return Err(format!("facet name missing in {raw:?}"));
  }
  let filter = match value {
    "ALL" => FacetFilter::All,
    v => FacetFilter::is(v),
  };
  Ok((name.to_owned(), filter))
}

/// Build the selection the date controls would hold: the named period
/// first, then any explicit endpoint edits.
pub fn selection(
  period: Option<NamedPeriod>,
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
  anchor: NaiveDateTime,
) -> PeriodSelection {
  let mut selection = match period {
    Some(p) => PeriodSelection::named(p, anchor),
    None => PeriodSelection::default(),
  };
  if start.is_some() {
    selection.edit_range(RangeEdit::Start(start));
  }
  if end.is_some() {
    selection.edit_range(RangeEdit::End(end));
  }
  selection
}

// ─── query ───────────────────────────────────────────────────────────────────

pub struct QueryArgs {
  pub search:    String,
  pub facets:    Vec<(String, FacetFilter)>,
  pub selection: PeriodSelection,
  pub page:      usize,
  pub page_size: Option<usize>,
  pub role:      Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryReport<'a> {
  pub fingerprint:          QueryFingerprint,
  pub range:                Option<DateRange>,
  pub range_ignored:        bool,
  pub unparseable_included: usize,
  pub page:                 Page<&'a Record>,
}

pub fn query<'a>(
  cfg: &EngineConfig,
  records: &'a [Record],
  args: QueryArgs,
) -> QueryReport<'a> {
  let mut filters = Filters::default().with_search(args.search);
  for (name, filter) in args.facets {
    filters = filters.with_facet(name, filter);
  }

  let mut request = QueryRequest::new(args.role.unwrap_or_else(|| cfg.date_role.clone()))
    .with_filters(filters)
    .with_selection(args.selection);
  if let Some(schema) = cfg.schema() {
    request = request.with_schema(schema);
  }

  let fingerprint = QueryFingerprint::compute(SNAPSHOT_VERSION, &request);
  let outcome = query::query(records, &request);
  let page_size = args.page_size.unwrap_or(cfg.page_size);

  QueryReport {
    fingerprint,
    range:                outcome.range,
    range_ignored:        outcome.range_ignored,
    unparseable_included: outcome.unparseable_included,
    page:                 page(&outcome.records, page_size, args.page),
  }
}

// ─── snapshot ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SnapshotRow {
  #[serde(flatten)]
  pub snapshot: Snapshot,
  pub trend:    Trend,
}

pub fn snapshot(cfg: &EngineConfig, period: NamedPeriod) -> anyhow::Result<Vec<SnapshotRow>> {
  let catalog = cfg.catalog()?;
  Ok(
    catalog
      .snapshots(period)
      .into_iter()
      .map(|snapshot| SnapshotRow { trend: snapshot.trend(), snapshot })
      .collect(),
  )
}

// ─── series ──────────────────────────────────────────────────────────────────

pub struct SeriesArgs {
  pub chart:      String,
  pub dimensions: Vec<String>,
  pub period:     NamedPeriod,
  pub mode:       ChartMode,
  pub buckets:    Option<usize>,
  pub seed:       Option<u64>,
  /// Count real records instead of modelling values.
  pub records:    Option<Vec<Record>>,
}

pub fn series(cfg: &EngineConfig, args: SeriesArgs) -> anyhow::Result<SeriesSet> {
  let synth = cfg.synthesizer()?;
  let mut registry = cfg.registry()?;
  let spec = SeriesSpec {
    selected: args.dimensions.into_iter().collect(),
    period:   args.period,
    mode:     args.mode,
  };
  let anchor = cfg.anchor().date();
  let count = args.buckets.unwrap_or_else(|| args.period.bucket_cap());
  let chart = chart_key(&args.chart);

  let set = match &args.records {
    Some(records) => {
      let mut source = RecordCountSource::new(records, cfg.date_role.clone());
      synth.synthesize(&mut registry, &mut source, &chart, &spec, anchor, count)
    }
    None => {
      let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
      };
      let mut source = JitterSource::new(rng);
      synth.synthesize(&mut registry, &mut source, &chart, &spec, anchor, count)
    }
  };
  Ok(set)
}

// ─── parse ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ParsedStamp {
  pub input:     String,
  pub stamp:     Stamp,
  /// The canonical compact form, when the input parsed.
  pub canonical: Option<String>,
}

pub fn parse(inputs: Vec<String>) -> Vec<ParsedStamp> {
  inputs
    .into_iter()
    .map(|input| {
      let stamp = timestamp::parse(&input);
      let canonical = stamp.instant().and_then(timestamp::format);
      ParsedStamp { input, stamp, canonical }
    })
    .collect()
}
