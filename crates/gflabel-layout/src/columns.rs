#![forbid(unsafe_code)]

//! Splitting the content area into columns and line slots.

use gflabel_core::Rect;
use smallvec::SmallVec;

/// Proportional horizontal split with a fixed gap between neighbours.
///
/// Column `i` gets `(width - gap * (n - 1)) * p_i / sum(p)`. Columns are
/// laid out left to right starting at the area's left edge, so the widths
/// and gaps add up to the area width exactly when the gaps fit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnFlex {
    proportions: SmallVec<[f64; 4]>,
    gap: f64,
}

impl ColumnFlex {
    pub fn new(proportions: impl IntoIterator<Item = f64>) -> Self {
        Self {
            proportions: proportions.into_iter().collect(),
            gap: 0.0,
        }
    }

    #[must_use]
    pub fn gap(mut self, gap: f64) -> Self {
        self.gap = gap.max(0.0);
        self
    }

    pub fn len(&self) -> usize {
        self.proportions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proportions.is_empty()
    }

    /// Compute column rects. An empty flex yields no rects.
    pub fn split(&self, area: Rect) -> SmallVec<[Rect; 4]> {
        let count = self.proportions.len();
        if count == 0 {
            return SmallVec::new();
        }

        let total_gap = self.gap * (count - 1) as f64;
        let available = (area.width - total_gap).max(0.0);
        let total: f64 = self.proportions.iter().sum();

        let mut rects = SmallVec::with_capacity(count);
        let mut x = area.x;
        for proportion in &self.proportions {
            let width = if total > 0.0 {
                available * proportion / total
            } else {
                available / count as f64
            };
            rects.push(Rect::new(x, area.y, width, area.height));
            x += width + self.gap;
        }
        rects
    }
}

/// Equal-height slots for `count` lines, top line first.
///
/// Slot height is `(height - spacing * (count - 1)) / count`, never
/// negative.
pub fn line_slots(column: Rect, count: usize, spacing: f64) -> SmallVec<[Rect; 4]> {
    if count == 0 {
        return SmallVec::new();
    }
    let spacing = spacing.max(0.0);
    let slot = ((column.height - spacing * (count - 1) as f64) / count as f64).max(0.0);

    (0..count)
        .map(|index| {
            let top = column.top() - (slot + spacing) * index as f64;
            Rect::new(column.x, top - slot, column.width, slot)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflabel_core::Size;

    const EPS: f64 = 1e-9;

    #[test]
    fn proportions_with_gaps() {
        let area = Rect::new(0.0, 0.0, 30.0, 10.0);
        let rects = ColumnFlex::new([4.0, 1.0, 2.0]).gap(1.0).split(area);
        assert_eq!(rects.len(), 3);
        assert!((rects[0].width - 28.0 * 4.0 / 7.0).abs() < EPS);
        assert!((rects[1].width - 28.0 / 7.0).abs() < EPS);
        assert!((rects[2].width - 28.0 * 2.0 / 7.0).abs() < EPS);
        assert!((rects[1].left() - rects[0].right() - 1.0).abs() < EPS);
        assert!((rects[2].right() - 30.0).abs() < EPS);
    }

    #[test]
    fn single_column_fills_area() {
        let area = Rect::from_size(Size::new(20.0, 8.0));
        let rects = ColumnFlex::new([1.0]).gap(5.0).split(area);
        assert_eq!(rects.as_slice(), &[area]);
    }

    #[test]
    fn gaps_wider_than_area_leave_zero_widths() {
        let area = Rect::new(0.0, 0.0, 2.0, 5.0);
        let rects = ColumnFlex::new([1.0, 1.0, 1.0]).gap(4.0).split(area);
        assert!(rects.iter().all(|rect| rect.width == 0.0));
    }

    #[test]
    fn empty_flex() {
        assert!(ColumnFlex::default().split(Rect::new(0.0, 0.0, 9.0, 9.0)).is_empty());
    }

    #[test]
    fn slots_stack_downwards() {
        let column = Rect::new(-5.0, -6.0, 10.0, 12.0);
        let slots = line_slots(column, 3, 0.3);
        let height = (12.0 - 0.6) / 3.0;
        assert_eq!(slots.len(), 3);
        for (index, slot) in slots.iter().enumerate() {
            assert!((slot.height - height).abs() < EPS);
            let centre = 6.0 - (height + 0.3) * index as f64 - height / 2.0;
            assert!((slot.center().y - centre).abs() < EPS);
        }
        assert!((slots[2].bottom() - column.bottom()).abs() < EPS);
    }

    #[test]
    fn oversized_spacing_clamps_slots() {
        let slots = line_slots(Rect::new(0.0, 0.0, 4.0, 1.0), 4, 2.0);
        assert!(slots.iter().all(|slot| slot.height == 0.0));
    }
}
