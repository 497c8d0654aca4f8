//! The record query engine behind every list page.
//!
//! `query` resolves the effective date range, filters the collection with a
//! [`Matcher`], and returns survivors newest-first. The sort is stable and
//! unparseable timestamps sink to the tail.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  filter::{FacetSchema, Filters, Matcher},
  fingerprint::QueryFingerprint,
  period::{DateRange, PeriodSelection},
  record::Record,
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Everything a list page feeds into one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
  #[serde(default)]
  pub filters:   Filters,
  #[serde(default)]
  pub selection: PeriodSelection,
  /// Which timestamp role participates in the date predicate and the sort.
  pub date_role: String,
  /// The domain's facet names. Filters outside it are ignored; when `None`
  /// every filter applies.
  #[serde(default)]
  pub schema:    Option<FacetSchema>,
}

impl QueryRequest {
  pub fn new(date_role: impl Into<String>) -> Self {
    Self {
      filters:   Filters::default(),
      selection: PeriodSelection::default(),
      date_role: date_role.into(),
      schema:    None,
    }
  }

  pub fn with_filters(mut self, filters: Filters) -> Self {
    self.filters = filters;
    self
  }

  pub fn with_selection(mut self, selection: PeriodSelection) -> Self {
    self.selection = selection;
    self
  }

  pub fn with_schema(mut self, schema: FacetSchema) -> Self {
    self.schema = Some(schema);
    self
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Query result as positions into the input collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIndices {
  /// Positions of matching records, newest first.
  pub indices:              Vec<usize>,
  /// The range that was applied, if any.
  pub range:                Option<DateRange>,
  /// The selection had endpoints but they did not form a usable range, so
  /// no date constraint was applied.
  pub range_ignored:        bool,
  /// Matching records whose active timestamp was missing or malformed.
  pub unparseable_included: usize,
}

/// Query result borrowing from the input collection.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome<'a> {
  pub records:              Vec<&'a Record>,
  pub range:                Option<DateRange>,
  pub range_ignored:        bool,
  pub unparseable_included: usize,
}

impl QueryIndices {
  pub fn resolve<'a>(&self, records: &'a [Record]) -> QueryOutcome<'a> {
    QueryOutcome {
      records:              self.indices.iter().filter_map(|&i| records.get(i)).collect(),
      range:                self.range,
      range_ignored:        self.range_ignored,
      unparseable_included: self.unparseable_included,
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Filter and sort `records` for `request`.
pub fn query<'a>(records: &'a [Record], request: &QueryRequest) -> QueryOutcome<'a> {
  query_indices(records, request).resolve(records)
}

/// Like [`query`], but returns positions instead of references.
pub fn query_indices(records: &[Record], request: &QueryRequest) -> QueryIndices {
  let range = request.selection.effective_range();
  let range_ignored = range.is_none() && {
    let (start, end) = request.selection.endpoints();
    start.is_some() || end.is_some()
  };

  let matcher = Matcher::new(&request.filters, request.schema.as_ref(), range, &request.date_role);

  let mut unparseable_included = 0;
  let mut hits: Vec<_> = records
    .iter()
    .enumerate()
    .filter_map(|(i, record)| {
      let result = matcher.evaluate(record);
      if !result.matched {
        return None;
      }
      if !result.stamp.is_parsed() {
        unparseable_included += 1;
      }
      Some((i, result.stamp))
    })
    .collect();

  // Stable: equal stamps keep collection order.
  hits.sort_by(|a, b| b.1.cmp(&a.1));

  debug!(
    total = records.len(),
    matched = hits.len(),
    role = %request.date_role,
    period = %request.selection.period(),
    "record query evaluated"
  );
  if unparseable_included > 0 {
    warn!(
      count = unparseable_included,
      role = %request.date_role,
      "records with unparseable timestamps kept in results"
    );
  }
  if range_ignored {
    warn!(selection = ?request.selection, "date range is incomplete or inverted; not filtering by date");
  }

  QueryIndices {
    indices: hits.into_iter().map(|(i, _)| i).collect(),
    range,
    range_ignored,
    unparseable_included,
  }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Memoizes query results per collection version.
///
/// Entries are keyed by [`QueryFingerprint`]. Loading a new collection
/// version drops every entry of the previous one.
#[derive(Debug, Default)]
pub struct QueryCache {
  version: Option<u64>,
  entries: HashMap<QueryFingerprint, QueryIndices>,
  hits:    u64,
  misses:  u64,
}

impl QueryCache {
  pub fn new() -> Self { Self::default() }

  /// Return the cached result for `(collection_version, request)` or
  /// compute and remember it. `records` must be the snapshot that
  /// `collection_version` names.
  pub fn query<'a>(
    &mut self,
    collection_version: u64,
    records: &'a [Record],
    request: &QueryRequest,
  ) -> QueryOutcome<'a> {
    if self.version != Some(collection_version) {
      if self.version.is_some() {
        debug!(
          from = ?self.version,
          to = collection_version,
          dropped = self.entries.len(),
          "collection version changed; clearing query cache"
        );
      }
      self.entries.clear();
      self.version = Some(collection_version);
    }

    let key = QueryFingerprint::compute(collection_version, request);
    if let Some(hit) = self.entries.get(&key) {
      self.hits += 1;
      return hit.resolve(records);
    }

    self.misses += 1;
    let computed = query_indices(records, request);
    let outcome = computed.resolve(records);
    self.entries.insert(key, computed);
    outcome
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// `(hits, misses)` since construction.
  pub fn stats(&self) -> (u64, u64) { (self.hits, self.misses) }
}
