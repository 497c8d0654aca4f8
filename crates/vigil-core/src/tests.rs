//! End-to-end scenarios across the query, paging, metric and chart modules.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
  color::ColorRegistry,
  filter::{FacetFilter, FacetSchema, Filters},
  metric::{MetricCatalog, MetricDefinition, ScalingRule, Trend},
  page::page,
  period::{DateRange, NamedPeriod, PeriodSelection, RangeEdit},
  query::{QueryCache, QueryRequest, query},
  record::{NEWLY_CREATED, Record},
  series::{ChartMode, Dimension, JitterSource, SeriesSpec, SeriesSynthesizer},
};

fn at(s: &str) -> NaiveDateTime {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn created(id: &str, stamp: &str) -> Record {
  Record::new(id).with_timestamp("created", stamp)
}

fn ids(records: &[&Record]) -> Vec<String> {
  records.iter().map(|r| r.id.clone()).collect()
}

// ─── Record queries ──────────────────────────────────────────────────────────

#[test]
fn daily_period_keeps_today_newest_first() {
  let records = vec![
    created("first", "25.06.18. 09:00:00"),
    created("second", "25.06.17. 23:59:00"),
    created("third", "25.06.18. 00:00:01"),
  ];
  let request = QueryRequest::new("created")
    .with_selection(PeriodSelection::named(NamedPeriod::Daily, at("2025-06-18T10:00:00")));

  let out = query(&records, &request);
  assert_eq!(ids(&out.records), ["first", "third"]);

  let range = out.range.unwrap();
  let (start, end) = range.bounds();
  assert_eq!(start, at("2025-06-18T00:00:00"));
  assert_eq!(end.format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
}

#[test]
fn unparseable_records_survive_every_date_range() {
  let records = vec![
    created("ok", "25.06.18. 09:00:00"),
    created("bad", "25-06-18 09:00"),
    Record::new("missing"),
  ];
  for period in [NamedPeriod::Daily, NamedPeriod::Weekly, NamedPeriod::Yearly] {
    let request = QueryRequest::new("created")
      .with_selection(PeriodSelection::named(period, at("2020-01-01T00:00:00")));
    let out = query(&records, &request);
    assert_eq!(ids(&out.records), ["bad", "missing"], "{period}");
    assert_eq!(out.unparseable_included, 2);
  }
}

#[test]
fn identical_instants_keep_collection_order() {
  let records: Vec<_> = ["r1", "r2", "r3", "r4"]
    .into_iter()
    .map(|id| created(id, "25.06.18. 09:00:00"))
    .collect();
  let out = query(&records, &QueryRequest::new("created"));
  assert_eq!(ids(&out.records), ["r1", "r2", "r3", "r4"]);
}

#[test]
fn all_sentinel_never_excludes() {
  let records = vec![
    created("a", "25.06.18. 09:00:00").with_facet("status", "open"),
    created("b", "25.06.18. 09:00:00").with_facet("status", "closed"),
    created("c", "25.06.18. 09:00:00"),
  ];
  let request = QueryRequest::new("created")
    .with_filters(Filters::default().with_facet("status", FacetFilter::All));
  assert_eq!(query(&records, &request).records.len(), 3);
}

#[test]
fn weekly_range_survives_switch_to_custom() {
  let anchor = at("2025-06-18T10:00:00");
  let mut selection = PeriodSelection::named(NamedPeriod::Weekly, anchor);
  assert_eq!(selection.endpoints(), (Some(day(2025, 6, 11)), Some(day(2025, 6, 18))));

  selection.select_period(NamedPeriod::Custom, anchor);
  assert_eq!(selection.period(), NamedPeriod::Custom);
  assert_eq!(selection.effective_range(), Some(DateRange::new(day(2025, 6, 11), day(2025, 6, 18))));

  selection.edit_range(RangeEdit::Start(Some(day(2025, 6, 15))));
  let records = vec![
    created("in", "25.06.16. 12:00:00"),
    created("out", "25.06.12. 12:00:00"),
  ];
  let out = query(&records, &QueryRequest::new("created").with_selection(selection));
  assert_eq!(ids(&out.records), ["in"]);
}

#[test]
fn transition_facets_find_newly_created_subjects() {
  let records = vec![
    created("1", "25.06.18. 09:00:00").with_transition("grade_before", None, "grade_after", "gold"),
    created("2", "25.06.18. 08:00:00").with_transition(
      "grade_before",
      Some("silver"),
      "grade_after",
      "gold",
    ),
  ];
  let request = QueryRequest::new("created").with_filters(
    Filters::default()
      .with_facet("grade_before", FacetFilter::is(NEWLY_CREATED))
      .with_facet("grade_after", FacetFilter::is("gold")),
  );
  assert_eq!(ids(&query(&records, &request).records), ["1"]);
}

#[test]
fn facetless_record_fails_concrete_filter_regardless_of_neighbours() {
  let bare = created("bare", "25.06.18. 09:00:00");
  let closed = created("closed", "25.06.18. 08:00:00").with_facet("status", "closed");
  let request = QueryRequest::new("created")
    .with_filters(Filters::default().with_facet("status", FacetFilter::is("open")));

  let alone = [bare.clone()];
  assert!(query(&alone, &request).records.is_empty());

  let with_neighbour = [bare, closed];
  assert!(query(&with_neighbour, &request).records.is_empty());

  let all = QueryRequest::new("created")
    .with_filters(Filters::default().with_facet("status", FacetFilter::All));
  assert_eq!(query(&alone, &all).records.len(), 1);
}

#[test]
fn declared_schema_ignores_stray_filters() {
  let records = vec![created("a", "25.06.18. 09:00:00").with_facet("kind", "spam")];
  let request = QueryRequest::new("created")
    .with_schema(FacetSchema::declared(["kind"]))
    .with_filters(Filters::default().with_facet("board", FacetFilter::is("free")));
  assert_eq!(query(&records, &request).records.len(), 1);
}

// ─── Paging ──────────────────────────────────────────────────────────────────

#[test]
fn paging_a_query_result_covers_every_record_once() {
  let records: Vec<_> = (0..45u32)
    .map(|i| created(&format!("r{i:02}"), &format!("25.06.{:02}. 09:00:00", 1 + i % 28)))
    .collect();
  let mut cache = QueryCache::new();
  let out = cache.query(7, &records, &QueryRequest::new("created"));

  let first = page(&out.records, 20, 1);
  assert_eq!(first.total_pages, 3);
  assert_eq!(page(&out.records, 20, 3).items.len(), 5);

  let total: usize = (1..=first.total_pages)
    .map(|i| page(&out.records, 20, i).items.len())
    .sum();
  assert_eq!(total, first.total_count);
  assert_eq!(total, 45);
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[test]
fn metric_catalog_from_config_json() {
  let defs: Vec<MetricDefinition> = serde_json::from_value(serde_json::json!([
    {
      "name": "new_members",
      "dimension_key": "members",
      "current": 1200,
      "base_rate_per_day": 8.0,
      "scaling": ScalingRule::LINEAR,
    },
    {
      "name": "reports_hidden",
      "dimension_key": "reports",
      "base_rate_per_day": 2.0,
      "scaling": ScalingRule::LINEAR,
      "damping": 0.5,
    },
  ]))
  .unwrap();
  let catalog = MetricCatalog::from_definitions(defs).unwrap();

  let weekly = catalog.snapshots(NamedPeriod::Weekly);
  assert_eq!(weekly[0].delta, 56);
  assert_eq!(weekly[0].current, 1200);
  assert_eq!(weekly[0].trend(), Trend::Up);
  assert_eq!(weekly[1].delta, 7);

  let custom = catalog.snapshots(NamedPeriod::Custom);
  assert_eq!(custom[0].delta, 8);
}

#[test]
fn chart_colors_are_stable_across_toggles() {
  let synth = SeriesSynthesizer::new([
    Dimension::new("mobile", 50.0),
    Dimension::new("desktop", 80.0),
  ])
  .unwrap();
  let mut registry = ColorRegistry::with_palettes(HashMap::new()).unwrap();
  let mut source = JitterSource::new(StdRng::seed_from_u64(42));
  let anchor = day(2025, 6, 18);
  let spec = |names: &[&str]| SeriesSpec {
    selected: names.iter().map(|s| (*s).to_owned()).collect(),
    period:   NamedPeriod::Weekly,
    mode:     ChartMode::Delta("new".into()),
  };

  let color_of = |set: &crate::series::SeriesSet, name: &str| {
    set.series.iter().find(|s| s.dimension == name).map(|s| s.color.clone())
  };

  let ab = synth.synthesize(&mut registry, &mut source, "visitors", &spec(&["mobile", "desktop"]), anchor, 12);
  let ba = synth.synthesize(&mut registry, &mut source, "visitors", &spec(&["desktop", "mobile"]), anchor, 12);
  assert_eq!(color_of(&ab, "mobile"), color_of(&ba, "mobile"));
  assert_eq!(color_of(&ab, "desktop"), color_of(&ba, "desktop"));
  assert_ne!(color_of(&ab, "mobile"), color_of(&ab, "desktop"));
  assert_eq!(ab.labels.len(), 12);
  assert!(ab.y_axis_max >= ab.series.iter().flat_map(|s| s.values.iter().copied()).max().unwrap());
}
