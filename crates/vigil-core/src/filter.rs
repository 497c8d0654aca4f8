//! Record predicates: categorical facets, text search and the date range.
//!
//! A [`Matcher`] is built once per query from the operator's [`Filters`] and
//! evaluated against every record. Predicates are ANDed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{period::DateRange, record::Record, timestamp::Stamp};

// ─── Facet filter value ──────────────────────────────────────────────────────

/// One facet constraint.
///
/// `All` is the "no constraint" sentinel. It is a distinct variant rather
/// than a reserved string, so no real categorical value can collide with it.
/// On the wire it is `null`.
#[derive(
  Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum FacetFilter {
  #[default]
  All,
  Is(String),
}

impl FacetFilter {
  pub fn is(value: impl Into<String>) -> Self { Self::Is(value.into()) }

  /// Exact, case-sensitive equality unless this is `All`.
  pub fn admits(&self, value: Option<&str>) -> bool {
    match self {
      Self::All => true,
      Self::Is(want) => value == Some(want.as_str()),
    }
  }
}

impl From<Option<String>> for FacetFilter {
  fn from(value: Option<String>) -> Self {
    value.map_or(Self::All, Self::Is)
  }
}

impl From<FacetFilter> for Option<String> {
  fn from(value: FacetFilter) -> Self {
    match value {
      FacetFilter::All => None,
      FacetFilter::Is(v) => Some(v),
    }
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// The search box and facet dropdowns of a list page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filters {
  /// Case-insensitive substring; empty matches everything.
  #[serde(default)]
  pub search: String,
  #[serde(default)]
  pub facets: BTreeMap<String, FacetFilter>,
}

impl Filters {
  pub fn with_search(mut self, search: impl Into<String>) -> Self {
    self.search = search.into();
    self
  }

  pub fn with_facet(mut self, name: impl Into<String>, filter: FacetFilter) -> Self {
    self.facets.insert(name.into(), filter);
    self
  }
}

// ─── Facet schema ────────────────────────────────────────────────────────────

/// The facet names a record domain knows about.
///
/// When a caller declares one, filters naming a facet outside it are
/// ignored, because list pages share filter state across domains with
/// different facet sets. Without a declared schema every filter applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetSchema {
  names: BTreeSet<String>,
}

impl FacetSchema {
  pub fn declared<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self { names: names.into_iter().map(Into::into).collect() }
  }

  pub fn knows(&self, name: &str) -> bool { self.names.contains(name) }

  /// Facet names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
    self.names.iter().map(String::as_str)
  }

  pub fn is_empty(&self) -> bool { self.names.is_empty() }
}

// ─── Date predicate ──────────────────────────────────────────────────────────

/// How a record fared against the date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateVerdict {
  /// No usable range was selected.
  Unconstrained,
  Inside,
  Outside,
  /// The active timestamp was missing or malformed; the record passes.
  Unparseable,
}

impl DateVerdict {
  pub fn evaluate(stamp: Stamp, range: Option<&DateRange>) -> Self {
    let Some(range) = range.filter(|r| r.is_well_ordered()) else {
      return Self::Unconstrained;
    };
    match stamp {
      Stamp::Unparseable => Self::Unparseable,
      Stamp::At(at) if range.contains(at) => Self::Inside,
      Stamp::At(_) => Self::Outside,
    }
  }

  pub fn passes(self) -> bool { !matches!(self, Self::Outside) }
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

/// A compiled record predicate.
#[derive(Debug, Clone)]
pub struct Matcher<'a> {
  needle:    String,
  facets:    Vec<(&'a str, &'a str)>,
  range:     Option<DateRange>,
  date_role: &'a str,
}

/// The outcome of matching one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
  pub stamp:   Stamp,
  pub date:    DateVerdict,
  pub matched: bool,
}

impl<'a> Matcher<'a> {
  pub fn new(
    filters: &'a Filters,
    schema: Option<&FacetSchema>,
    range: Option<DateRange>,
    date_role: &'a str,
  ) -> Self {
    let facets = filters
      .facets
      .iter()
      .filter(|(name, _)| schema.is_none_or(|s| s.knows(name)))
      .filter_map(|(name, f)| match f {
        FacetFilter::All => None,
        FacetFilter::Is(v) => Some((name.as_str(), v.as_str())),
      })
      .collect();

    Self {
      needle: filters.search.to_lowercase(),
      facets,
      range: range.filter(DateRange::is_well_ordered),
      date_role,
    }
  }

  pub fn range(&self) -> Option<&DateRange> { self.range.as_ref() }

  pub fn matches_text(&self, record: &Record) -> bool {
    self.needle.is_empty()
      || record
        .text_fields
        .iter()
        .any(|t| t.to_lowercase().contains(&self.needle))
  }

  pub fn matches_facets(&self, record: &Record) -> bool {
    self
      .facets
      .iter()
      .all(|(name, want)| record.facet(name) == Some(*want))
  }

  pub fn evaluate(&self, record: &Record) -> MatchResult {
    let stamp = record.stamp(self.date_role);
    let date = DateVerdict::evaluate(stamp, self.range.as_ref());
    let matched =
      self.matches_text(record) && self.matches_facets(record) && date.passes();
    MatchResult { stamp, date, matched }
  }

  pub fn matches(&self, record: &Record) -> bool { self.evaluate(record).matched }
}
