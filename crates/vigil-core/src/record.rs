//! The opaque row every list page hands to the engine.
//!
//! Member status changes, reports, votes, suggestions, posts, policies and
//! popups all reduce to the same shape: an id, one or more compact
//! timestamps keyed by role, some searchable text, categorical facets and
//! pass-through counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  timestamp::{self, Stamp},
};

/// The category an absent "before" value of a transition facet maps to.
pub const NEWLY_CREATED: &str = "newly_created";

/// An item from one of the backoffice domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  pub id:          String,
  /// Role name (e.g. `"created"`, `"modified"`, `"event"`) → compact
  /// timestamp string.
  #[serde(default)]
  pub timestamps:  BTreeMap<String, String>,
  /// Strings eligible for substring search, in display order.
  #[serde(default)]
  pub text_fields: Vec<String>,
  /// Facet name → categorical value.
  #[serde(default)]
  pub facets:      BTreeMap<String, String>,
  /// Display-only counters (views, likes, reports).
  #[serde(default)]
  pub counters:    BTreeMap<String, i64>,
}

impl Record {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into(), ..Self::default() }
  }

  pub fn with_timestamp(
    mut self,
    role: impl Into<String>,
    compact: impl Into<String>,
  ) -> Self {
    self.timestamps.insert(role.into(), compact.into());
    self
  }

  pub fn with_text(mut self, text: impl Into<String>) -> Self {
    self.text_fields.push(text.into());
    self
  }

  pub fn with_facet(
    mut self,
    name: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    self.facets.insert(name.into(), value.into());
    self
  }

  /// Store a before/after transition as two facets. A missing `before`
  /// (the subject did not exist yet) is recorded as [`NEWLY_CREATED`].
  pub fn with_transition(
    self,
    before_facet: impl Into<String>,
    before: Option<&str>,
    after_facet: impl Into<String>,
    after: impl Into<String>,
  ) -> Self {
    self
      .with_facet(before_facet, before.unwrap_or(NEWLY_CREATED))
      .with_facet(after_facet, after)
  }

  pub fn with_counter(mut self, name: impl Into<String>, value: i64) -> Self {
    self.counters.insert(name.into(), value);
    self
  }

  /// The parsed timestamp for `role`; a missing role is unparseable.
  pub fn stamp(&self, role: &str) -> Stamp {
    self
      .timestamps
      .get(role)
      .map_or(Stamp::Unparseable, |s| timestamp::parse(s))
  }

  pub fn facet(&self, name: &str) -> Option<&str> {
    self.facets.get(name).map(String::as_str)
  }
}

/// Decode a record snapshot: a JSON array of records.
pub fn from_json(raw: &str) -> Result<Vec<Record>> {
  Ok(serde_json::from_str(raw)?)
}
