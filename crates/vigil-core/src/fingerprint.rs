//! Query fingerprints for memoizing list-page queries.
//!
//! A fingerprint is a SHA-256 digest over the collection version and every
//! input that can change a query's result. Facet filters are hashed in name
//! order, so the order the operator touched the dropdowns in is irrelevant.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{filter::FacetFilter, query::QueryRequest};

/// Hex-encoded digest identifying one `(collection version, request)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
  pub fn compute(collection_version: u64, request: &QueryRequest) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(collection_version.to_le_bytes());
    update_str(&mut hasher, &request.date_role);
    update_str(&mut hasher, &request.filters.search);

    hasher.update((request.filters.facets.len() as u64).to_le_bytes());
    for (name, filter) in &request.filters.facets {
      update_str(&mut hasher, name);
      match filter {
        FacetFilter::All => hasher.update([0u8]),
        FacetFilter::Is(v) => {
          hasher.update([1u8]);
          update_str(&mut hasher, v);
        }
      }
    }

    let period: &'static str = request.selection.period().into();
    update_str(&mut hasher, period);
    let (start, end) = request.selection.endpoints();
    update_date(&mut hasher, start);
    update_date(&mut hasher, end);

    match &request.schema {
      None => hasher.update([0u8]),
      Some(schema) => {
        hasher.update([1u8]);
        for name in schema.names() {
          update_str(&mut hasher, name);
        }
      }
    }

    Self(hex::encode(hasher.finalize()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for QueryFingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// Length-prefixed so adjacent fields cannot run together.
fn update_str(hasher: &mut Sha256, s: &str) {
  hasher.update((s.len() as u64).to_le_bytes());
  hasher.update(s.as_bytes());
}

fn update_date(hasher: &mut Sha256, date: Option<NaiveDate>) {
  match date {
    None => hasher.update([0u8]),
    Some(d) => {
      hasher.update([1u8]);
      hasher.update(d.to_string().as_bytes());
    }
  }
}
