//! Core engine for the Vigil moderation dashboard.
//!
//! Everything here is synchronous and in-memory: compact timestamp parsing,
//! period resolution, record filtering and sorting, pagination, metric
//! snapshots, chart series and their colors. Loading records and rendering
//! them are left to callers such as `vigil-cli`.

pub mod color;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod metric;
pub mod page;
pub mod period;
pub mod query;
pub mod record;
pub mod series;
pub mod timestamp;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
