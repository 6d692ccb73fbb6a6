#![forbid(unsafe_code)]

//! Font metrics capability.
//!
//! [`AdvanceMetrics`] is the built-in implementation: a per-character
//! advance table expressed in em units, built once and only read
//! afterwards. Text height is the em box, so a run measured at `size`
//! millimetres is exactly `size` tall.

use std::path::PathBuf;

use gflabel_core::{FontOptions, FontStyle, Size};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Identifies the face text is measured and rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontRef {
    pub family: String,
    pub style: FontStyle,
    pub path: Option<PathBuf>,
}

impl FontRef {
    pub fn new(family: impl Into<String>, style: FontStyle) -> Self {
        Self {
            family: family.into(),
            style,
            path: None,
        }
    }
}

impl From<&FontOptions> for FontRef {
    fn from(options: &FontOptions) -> Self {
        Self {
            family: options.family.clone(),
            style: options.style,
            path: options.path.clone(),
        }
    }
}

impl Default for FontRef {
    fn default() -> Self {
        Self::from(&FontOptions::default())
    }
}

/// Measures text runs.
///
/// `measure` must return identical extents for identical inputs; the fit
/// search and placement idempotence rely on it.
pub trait FontMetrics: Send + Sync {
    fn measure(&self, text: &str, font: &FontRef, size_mm: f64) -> Size;
}

// =========================================================================
// Built-in advance table
// =========================================================================

/// Advance widths in em, grouped by glyph class. Values approximate a
/// humanist sans face.
const ADVANCE_GROUPS: &[(&str, f64)] = &[
    (" ", 0.26),
    ("iljI.,:;'|!`", 0.27),
    ("frt()[]{}\"/\\-", 0.36),
    ("abcdeghknopqsuvxyz", 0.56),
    ("mw", 0.86),
    ("0123456789", 0.57),
    ("ABCDEFGHJKLNOPQRSTUVXYZ", 0.66),
    ("MW", 0.9),
    ("#$%&*+<=>?@^_~", 0.6),
];

/// Advance for characters outside the table.
const FALLBACK_ADVANCE: f64 = 0.6;
/// Advance of a double-width (East Asian wide) character.
const WIDE_ADVANCE: f64 = 1.0;
/// Horizontal growth of bold faces.
const BOLD_FACTOR: f64 = 1.06;

/// Deterministic metrics from a fixed advance table.
#[derive(Debug, Clone)]
pub struct AdvanceMetrics {
    advances: FxHashMap<char, f64>,
}

impl AdvanceMetrics {
    pub fn new() -> Self {
        let mut advances = FxHashMap::default();
        for (chars, em) in ADVANCE_GROUPS {
            for c in chars.chars() {
                advances.insert(c, *em);
            }
        }
        tracing::debug!(glyphs = advances.len(), "built advance table");
        Self { advances }
    }

    /// Override the advance of a single character.
    #[must_use]
    pub fn with_advance(mut self, c: char, em: f64) -> Self {
        self.advances.insert(c, em);
        self
    }

    /// Advance of one grapheme cluster in em. Combining marks add nothing.
    fn cluster_advance(&self, cluster: &str) -> f64 {
        let Some(first) = cluster.chars().next() else {
            return 0.0;
        };
        if let Some(em) = self.advances.get(&first) {
            return *em;
        }
        match first.width() {
            Some(0) | None => 0.0,
            Some(2) => WIDE_ADVANCE,
            Some(_) => FALLBACK_ADVANCE,
        }
    }

    /// Width of `text` in em, before style adjustments.
    pub fn em_width(&self, text: &str) -> f64 {
        text.graphemes(true)
            .map(|cluster| self.cluster_advance(cluster))
            .sum()
    }
}

impl Default for AdvanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FontMetrics for AdvanceMetrics {
    fn measure(&self, text: &str, font: &FontRef, size_mm: f64) -> Size {
        if text.is_empty() || size_mm <= 0.0 {
            return Size::default();
        }
        let style_factor = match font.style {
            FontStyle::Bold => BOLD_FACTOR,
            FontStyle::Regular | FontStyle::Italic => 1.0,
        };
        Size::new(self.em_width(text) * style_factor * size_mm, size_mm)
    }
}

/// Every grapheme has the same advance. Handy when widths must be easy to
/// reason about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMetrics {
    pub advance_em: f64,
}

impl MonospaceMetrics {
    pub const fn new(advance_em: f64) -> Self {
        Self { advance_em }
    }
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl FontMetrics for MonospaceMetrics {
    fn measure(&self, text: &str, _font: &FontRef, size_mm: f64) -> Size {
        if text.is_empty() || size_mm <= 0.0 {
            return Size::default();
        }
        let clusters = text.graphemes(true).count() as f64;
        Size::new(clusters * self.advance_em * size_mm, size_mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn regular() -> FontRef {
        FontRef::default()
    }

    #[test]
    fn empty_text_has_no_extent() {
        let metrics = AdvanceMetrics::new();
        assert_eq!(metrics.measure("", &regular(), 5.0), Size::default());
    }

    #[test]
    fn height_is_the_em_box() {
        let metrics = AdvanceMetrics::new();
        assert_eq!(metrics.measure("Hello", &regular(), 4.0).height, 4.0);
    }

    #[test]
    fn narrow_glyphs_are_narrower() {
        let metrics = AdvanceMetrics::new();
        let narrow = metrics.measure("iii", &regular(), 5.0).width;
        let wide = metrics.measure("MMM", &regular(), 5.0).width;
        assert!(narrow < wide);
    }

    #[test]
    fn combining_marks_add_no_width() {
        let metrics = AdvanceMetrics::new();
        let plain = metrics.em_width("e");
        let accented = metrics.em_width("e\u{301}");
        assert_eq!(plain, accented);
    }

    #[test]
    fn wide_characters_use_full_em() {
        let metrics = AdvanceMetrics::new();
        assert_eq!(metrics.em_width("\u{4e2d}"), WIDE_ADVANCE);
    }

    #[test]
    fn bold_is_wider() {
        let metrics = AdvanceMetrics::new();
        let bold = FontRef::new("Open Sans", FontStyle::Bold);
        assert!(
            metrics.measure("label", &bold, 5.0).width
                > metrics.measure("label", &regular(), 5.0).width
        );
    }

    #[test]
    fn overrides_replace_table_entries() {
        let metrics = AdvanceMetrics::new().with_advance('x', 2.0);
        assert_eq!(metrics.em_width("xx"), 4.0);
    }

    #[test]
    fn monospace_counts_clusters() {
        let metrics = MonospaceMetrics::new(0.5);
        assert_eq!(metrics.measure("CCC", &regular(), 2.0), Size::new(3.0, 2.0));
    }

    proptest! {
        #[test]
        fn width_scales_linearly_with_size(text in "[ -~]{1,24}", size in 0.5f64..20.0) {
            let metrics = AdvanceMetrics::new();
            let unit = metrics.measure(&text, &regular(), 1.0).width;
            let scaled = metrics.measure(&text, &regular(), size).width;
            prop_assert!((scaled - unit * size).abs() < 1e-9 * size.max(1.0) * unit.max(1.0));
        }

        #[test]
        fn measurement_is_deterministic(text in "\\PC{0,32}", size in 0.1f64..30.0) {
            let metrics = AdvanceMetrics::new();
            let first = metrics.measure(&text, &regular(), size);
            let second = metrics.measure(&text, &regular(), size);
            prop_assert_eq!(first.width.to_bits(), second.width.to_bits());
            prop_assert_eq!(first.height.to_bits(), second.height.to_bits());
        }
    }
}
