//! Stable series colors for dashboard charts.
//!
//! Each chart has a palette table. Dimensions listed in the table always get
//! their listed color. Dimensions the table does not know draw from the
//! chart's overflow colors on first sight and keep that color for the life
//! of the registry; once overflow runs out they get the fallback color.
//! Assignments are never reassigned or evicted.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The fallback color of the built-in palette.
pub const DEFAULT_FALLBACK: &str = "#9CA3AF";

/// Overflow colors of the built-in palette used for unconfigured charts.
pub const DEFAULT_OVERFLOW: [&str; 8] = [
  "#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6", "#EC4899",
  "#14B8A6", "#F97316",
];

// ─── Palette ─────────────────────────────────────────────────────────────────

/// A dimension with a fixed color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
  pub dimension: String,
  pub color:     String,
}

/// The color table of one chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
  /// Fixed colors, in legend order.
  #[serde(default)]
  pub entries:  Vec<PaletteEntry>,
  /// Colors handed out to dimensions missing from `entries`.
  #[serde(default)]
  pub overflow: Vec<String>,
  pub fallback: String,
}

impl Default for Palette {
  fn default() -> Self {
    Self {
      entries:  Vec::new(),
      overflow: DEFAULT_OVERFLOW.iter().map(|c| (*c).to_owned()).collect(),
      fallback: DEFAULT_FALLBACK.to_owned(),
    }
  }
}

impl Palette {
  fn validate(&self, chart: &str) -> Result<()> {
    if self.fallback.is_empty() {
      return Err(Error::EmptyPalette(chart.to_owned()));
    }
    let mut seen = HashSet::new();
    for entry in &self.entries {
      if !seen.insert(entry.dimension.as_str()) {
        return Err(Error::DuplicatePaletteEntry {
          chart:     chart.to_owned(),
          dimension: entry.dimension.clone(),
        });
      }
    }
    Ok(())
  }

  fn fixed_slot(&self, dimension: &str) -> Option<usize> {
    self.entries.iter().position(|e| e.dimension == dimension)
  }
}

// ─── Slots ───────────────────────────────────────────────────────────────────

/// Where a dimension's color comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Slot {
  /// Index into the palette's `entries`.
  Fixed(usize),
  /// Index into the palette's `overflow`.
  Overflow(usize),
  Fallback,
}

/// A resolved color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assigned {
  pub slot:  Slot,
  pub color: String,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Session-wide, append-only color assignments.
///
/// Owned by the chart-rendering context and passed by reference into
/// [`crate::series::SeriesSynthesizer::synthesize`].
#[derive(Debug, Clone, Default)]
pub struct ColorRegistry {
  palettes: HashMap<String, Palette>,
  default:  Palette,
  /// chart → dimension → non-fixed slot, in order of first sight.
  assigned: HashMap<String, HashMap<String, Slot>>,
}

impl ColorRegistry {
  /// A registry where every chart uses the built-in palette.
  pub fn new() -> Self { Self::default() }

  /// Build from per-chart palette tables, validating each.
  pub fn with_palettes(palettes: HashMap<String, Palette>) -> Result<Self> {
    for (chart, palette) in &palettes {
      palette.validate(chart)?;
    }
    Ok(Self { palettes, ..Self::default() })
  }

  pub fn palette(&self, chart: &str) -> &Palette {
    self.palettes.get(chart).unwrap_or(&self.default)
  }

  /// The color for `dimension` on `chart`, recording a new assignment if
  /// this is the first time an unlisted dimension is seen.
  pub fn assign(&mut self, chart: &str, dimension: &str) -> Assigned {
    let palette = self.palettes.get(chart).unwrap_or(&self.default);

    let slot = match palette.fixed_slot(dimension) {
      Some(i) => Slot::Fixed(i),
      None => {
        let chart_slots = self.assigned.entry(chart.to_owned()).or_default();
        match chart_slots.get(dimension) {
          Some(slot) => *slot,
          None => {
            let used = chart_slots
              .values()
              .filter(|s| matches!(s, Slot::Overflow(_)))
              .count();
            let slot = if used < palette.overflow.len() {
              Slot::Overflow(used)
            } else {
              Slot::Fallback
            };
            tracing::debug!(chart, dimension, ?slot, "assigned color slot");
            chart_slots.insert(dimension.to_owned(), slot);
            slot
          }
        }
      }
    };

    Assigned { slot, color: color_of(palette, slot) }
  }

  /// The already-assigned color, without recording anything.
  pub fn peek(&self, chart: &str, dimension: &str) -> Option<Assigned> {
    let palette = self.palette(chart);
    let slot = match palette.fixed_slot(dimension) {
      Some(i) => Slot::Fixed(i),
      None => *self.assigned.get(chart)?.get(dimension)?,
    };
    Some(Assigned { slot, color: color_of(palette, slot) })
  }
}

fn color_of(palette: &Palette, slot: Slot) -> String {
  let color = match slot {
    Slot::Fixed(i) => palette.entries.get(i).map(|e| e.color.as_str()),
    Slot::Overflow(i) => palette.overflow.get(i).map(String::as_str),
    Slot::Fallback => None,
  };
  color.unwrap_or(&palette.fallback).to_owned()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn members_palette() -> Palette {
    Palette {
      entries:  vec![
        PaletteEntry { dimension: "new_members".into(), color: "#111111".into() },
        PaletteEntry { dimension: "pc_visitors".into(), color: "#222222".into() },
      ],
      overflow: vec!["#AAAAAA".into()],
      fallback: "#000000".into(),
    }
  }

  fn registry() -> ColorRegistry {
    ColorRegistry::with_palettes(HashMap::from([("members".to_owned(), members_palette())]))
      .unwrap()
  }

  #[test]
  fn listed_dimensions_keep_their_table_color() {
    let mut reg = registry();
    let b = reg.assign("members", "pc_visitors");
    let a = reg.assign("members", "new_members");
    assert_eq!(a, Assigned { slot: Slot::Fixed(0), color: "#111111".into() });
    assert_eq!(b, Assigned { slot: Slot::Fixed(1), color: "#222222".into() });
  }

  #[test]
  fn unlisted_dimensions_take_overflow_then_fallback_and_keep_it() {
    let mut reg = registry();
    assert_eq!(reg.assign("members", "mobile").color, "#AAAAAA");
    assert_eq!(reg.assign("members", "tablet").slot, Slot::Fallback);
    assert_eq!(reg.assign("members", "tablet").color, "#000000");
    assert_eq!(reg.assign("members", "mobile").color, "#AAAAAA");
  }

  #[test]
  fn assignments_are_per_chart() {
    let mut reg = registry();
    assert_eq!(reg.assign("posts", "x").slot, Slot::Overflow(0));
    assert_eq!(reg.assign("posts", "y").slot, Slot::Overflow(1));
    assert_eq!(reg.assign("reports", "y").slot, Slot::Overflow(0));
    assert_eq!(reg.assign("posts", "y").color, DEFAULT_OVERFLOW[1]);
  }

  #[test]
  fn peek_does_not_record() {
    let mut reg = registry();
    assert_eq!(reg.peek("members", "mobile"), None);
    assert!(reg.peek("members", "new_members").is_some());
    reg.assign("members", "mobile");
    assert_eq!(reg.peek("members", "mobile").unwrap().slot, Slot::Overflow(0));
  }

  #[test]
  fn invalid_palettes_fail_at_construction() {
    let mut dup = members_palette();
    dup.entries.push(dup.entries[0].clone());
    let err = ColorRegistry::with_palettes(HashMap::from([("m".to_owned(), dup)])).unwrap_err();
    assert!(matches!(err, Error::DuplicatePaletteEntry { .. }));

    let mut empty = members_palette();
    empty.fallback.clear();
    let err = ColorRegistry::with_palettes(HashMap::from([("m".to_owned(), empty)])).unwrap_err();
    assert!(matches!(err, Error::EmptyPalette(_)));
  }
}
