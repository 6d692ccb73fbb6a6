#![forbid(unsafe_code)]

//! Overheight coordination.
//!
//! A few fragments draw taller than a text line at the same size. Without
//! coordination the fit pass would shrink the whole line until the tall
//! fragment fits its slot. The coordinator instead works out, per line,
//! one shrink factor for every other item and a base size for the tall
//! ones, before fitting runs. Factors never cross lines or columns.

use serde::Serialize;

use crate::line::LineContent;

/// Base size and relative scale of one line item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemBase {
    /// Line size the item is laid out at before fitting, in mm.
    pub size: f64,
    /// `size` relative to the row size.
    pub scale: f64,
}

/// Result of scanning one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineShrink {
    /// Factor applied to the ordinary items of the line.
    pub shrink: f64,
    /// Tallest overheight height at the row size, if the line has one.
    pub overheight_mm: Option<f64>,
    pub items: Vec<ItemBase>,
}

impl LineShrink {
    pub fn bases(&self) -> impl Iterator<Item = f64> + '_ {
        self.items.iter().map(|item| item.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverheightCoordinator {
    pub enabled: bool,
}

impl Default for OverheightCoordinator {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl OverheightCoordinator {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Base sizes for a line with row size `row` inside a slot `slot` mm
    /// tall.
    ///
    /// Fixed sizing bypasses coordination: every item sits at `row`.
    /// Enabled, the ordinary items shrink by `row / (factor * row)` and each
    /// overheight item gets `min(row, slot / factor)`, so it may grow past
    /// the row but never past the slot. Disabled, overheight items get
    /// `row / factor` and the rest keep `row`.
    pub fn scan(&self, content: &LineContent<'_>, row: f64, slot: f64, fixed: bool) -> LineShrink {
        let factor = content.overheight_factor();
        let overheight_mm = factor.map(|factor| factor * row);

        let unit = |size: f64, fallback: f64| if row > 0.0 { size / row } else { fallback };

        if fixed {
            return LineShrink {
                shrink: 1.0,
                overheight_mm,
                items: content
                    .items
                    .iter()
                    .map(|_| ItemBase {
                        size: row,
                        scale: 1.0,
                    })
                    .collect(),
            };
        }

        let shrink = match overheight_mm {
            Some(h_over) if self.enabled && h_over > row => (row / h_over).clamp(f64::MIN_POSITIVE, 1.0),
            _ => 1.0,
        };

        let items = content
            .items
            .iter()
            .map(|item| match item.overheight {
                Some(own) if own > 0.0 => {
                    let size = if self.enabled {
                        row.min(slot / own)
                    } else {
                        row / own
                    };
                    ItemBase {
                        size,
                        scale: unit(size, 1.0 / own),
                    }
                }
                _ => ItemBase {
                    size: row * shrink,
                    scale: shrink,
                },
            })
            .collect();

        if shrink < 1.0 {
            tracing::debug!(row, shrink, overheight_mm, "pre-shrinking overheight siblings");
        }

        LineShrink {
            shrink,
            overheight_mm,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflabel_fragments::FragmentRegistry;
    use gflabel_parse::{Line, parse};

    fn line_of(source: &str) -> Line {
        let ast = parse(source, FragmentRegistry::builtin()).unwrap();
        let mut column = ast.structure().columns.remove(0);
        column.lines.remove(0)
    }

    #[test]
    fn plain_line_is_untouched() {
        let line = line_of("M3 x 10{washer}");
        let content = LineContent::classify(&line, FragmentRegistry::builtin());
        let scan = OverheightCoordinator::default().scan(&content, 5.0, 5.0, false);
        assert_eq!(scan.shrink, 1.0);
        assert_eq!(scan.overheight_mm, None);
        assert!(scan.bases().all(|base| base == 5.0));
    }

    #[test]
    fn siblings_shrink_by_row_over_overheight() {
        let line = line_of("M3{webbolt}");
        let content = LineContent::classify(&line, FragmentRegistry::builtin());
        let row = 10.0_f64;
        let scan = OverheightCoordinator::default().scan(&content, row, row, false);
        assert_eq!(scan.shrink, row / (1.6 * row));
        assert_eq!(scan.items[0].size, row * scan.shrink);
        // The webbolt fills its slot: 1.6 * (10 / 1.6).
        assert_eq!(scan.items[1].size, row / 1.6);
    }

    #[test]
    fn overheight_item_may_exceed_a_capped_row() {
        let line = line_of("{variable_resistor}R");
        let content = LineContent::classify(&line, FragmentRegistry::builtin());
        let scan = OverheightCoordinator::default().scan(&content, 4.0, 9.0, false);
        // min(4, 9 / 1.5) keeps the resistor at the row size, 6 mm tall.
        assert_eq!(scan.items[0].size, 4.0);
        assert!(1.5 * scan.items[0].size > 4.0);
        assert_eq!(scan.items[1].size, 4.0 * (4.0 / (1.5 * 4.0)));
    }

    #[test]
    fn disabled_coordinator_leaves_siblings_alone() {
        let line = line_of("M3{webbolt}");
        let content = LineContent::classify(&line, FragmentRegistry::builtin());
        let scan = OverheightCoordinator::new(false).scan(&content, 10.0, 10.0, false);
        assert_eq!(scan.shrink, 1.0);
        assert_eq!(scan.items[0].size, 10.0);
        assert_eq!(scan.items[1].size, 10.0 / 1.6);
    }

    #[test]
    fn fixed_sizing_bypasses_coordination() {
        let line = line_of("M3{webbolt}");
        let content = LineContent::classify(&line, FragmentRegistry::builtin());
        let scan = OverheightCoordinator::default().scan(&content, 7.0, 3.0, true);
        assert_eq!(scan.shrink, 1.0);
        assert!(scan.bases().all(|base| base == 7.0));
        assert_eq!(scan.overheight_mm, Some(1.6 * 7.0));
    }
}
