//! In-memory page slicing for list views.

use serde::{Deserialize, Serialize};

/// One page of an ordered collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:       Vec<T>,
  /// The 1-based index that was requested.
  pub page_index:  usize,
  pub total_pages: usize,
  pub total_count: usize,
}

/// Slice `items` into the 1-based page `page_index` of `page_size` items.
///
/// `total_pages = ceil(total_count / page_size)`, and 0 for an empty
/// collection. The index is not clamped: an out-of-range request (including
/// 0) yields an empty `items`. A `page_size` of 0 has no pages.
pub fn page<T: Clone>(items: &[T], page_size: usize, page_index: usize) -> Page<T> {
  let total_count = items.len();
  let total_pages = if page_size == 0 { 0 } else { total_count.div_ceil(page_size) };

  let window = match page_index.checked_sub(1) {
    Some(zero_based) if zero_based < total_pages => {
      let start = zero_based * page_size;
      let end = (start + page_size).min(total_count);
      items[start..end].to_vec()
    }
    _ => Vec::new(),
  };

  Page { items: window, page_index, total_pages, total_count }
}

/// Clamp a requested index into `[1, total_pages]` (1 when there are no
/// pages), for callers that want a UI-friendly page number.
pub fn clamp_page_index(page_index: usize, total_pages: usize) -> usize {
  page_index.clamp(1, total_pages.max(1))
}
