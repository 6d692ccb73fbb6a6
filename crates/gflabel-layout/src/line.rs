#![forbid(unsafe_code)]

//! Classification and measurement of the items on one line.

use std::cmp::Reverse;

use gflabel_core::Size;
use gflabel_fragments::{
    Capabilities, Extent, FragmentRegistry, intrinsic_size, min_width, offered_extent,
};
use gflabel_parse::{Line, Node, SpannedNode};
use gflabel_text::{FontMetrics, FontRef};
use smallvec::SmallVec;

/// How an item takes up width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemClass {
    /// Text or an intrinsically sized fragment. Scales with the line.
    Scaled,
    /// Blank space of a fixed width in mm.
    Gap(f64),
    /// Takes its width from what is left on the line.
    Variable { priority: u8 },
}

#[derive(Debug, Clone, Copy)]
pub struct LineItem<'a> {
    /// Position among the line's items.
    pub index: usize,
    pub node: &'a SpannedNode,
    pub class: ItemClass,
    /// Height multiple of the line size, for overheight fragments.
    pub overheight: Option<f64>,
}

impl LineItem<'_> {
    pub fn is_variable(&self) -> bool {
        matches!(self.class, ItemClass::Variable { .. })
    }

    /// Size at line size `size`. Variable items report their minimum width.
    pub fn measure(&self, metrics: &dyn FontMetrics, font: &FontRef, size: f64) -> Size {
        match (&self.node.node, self.class) {
            (Node::TextRun { text }, _) => metrics.measure(text, font, size),
            (_, ItemClass::Gap(width)) => Size::new(width, size),
            (Node::Fragment(fragment), ItemClass::Variable { .. }) => Size::new(
                min_width(fragment.kind, &fragment.params, size),
                size,
            ),
            (Node::Fragment(fragment), ItemClass::Scaled) => {
                intrinsic_size(fragment.kind, &fragment.params, size)
            }
            _ => Size::default(),
        }
    }
}

/// The placeable items of a line, in source order.
#[derive(Debug, Clone, Default)]
pub struct LineContent<'a> {
    pub items: SmallVec<[LineItem<'a>; 8]>,
}

impl<'a> LineContent<'a> {
    pub fn classify(line: &'a Line, registry: &FragmentRegistry) -> Self {
        let mut items = SmallVec::new();
        for node in &line.items {
            let (class, overheight) = match &node.node {
                Node::TextRun { .. } => (ItemClass::Scaled, None),
                Node::Gap { width_mm } => (ItemClass::Gap(*width_mm), None),
                Node::Fragment(fragment) => {
                    let descriptor = registry.descriptor(fragment.kind);
                    if descriptor.has(Capabilities::STRUCTURAL) {
                        continue;
                    }
                    let class = if descriptor.is_variable_width() {
                        ItemClass::Variable {
                            priority: descriptor.priority,
                        }
                    } else {
                        ItemClass::Scaled
                    };
                    (class, descriptor.overheight)
                }
                Node::ColumnSeparator { .. } | Node::Align { .. } | Node::Newline => continue,
            };
            items.push(LineItem {
                index: items.len(),
                node,
                class,
                overheight,
            });
        }
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Largest overheight factor on the line, if any item has one.
    pub fn overheight_factor(&self) -> Option<f64> {
        self.items
            .iter()
            .filter_map(|item| item.overheight)
            .reduce(f64::max)
    }

    /// Combined extent with item `i` at size `sizes[i]`: widths add up,
    /// the height is the tallest item.
    pub fn extent(&self, metrics: &dyn FontMetrics, font: &FontRef, sizes: &[f64]) -> Size {
        self.items
            .iter()
            .zip(sizes)
            .fold(Size::default(), |acc, (item, size)| {
                let item_size = item.measure(metrics, font, *size);
                Size::new(acc.width + item_size.width, acc.height.max(item_size.height))
            })
    }

    /// Tallest item that is not overheight, at a common size.
    pub fn natural_height(&self, metrics: &dyn FontMetrics, font: &FontRef, size: f64) -> f64 {
        self.items
            .iter()
            .filter(|item| item.overheight.is_none())
            .map(|item| item.measure(metrics, font, size).height)
            .fold(0.0, f64::max)
    }

    /// Final extent of every item once sizes are known.
    ///
    /// Fixed items take their measured size. The width left over is handed
    /// to variable items by descending priority; each is offered
    /// `max(remaining / count, min_width)` and consumes what it uses.
    pub fn distribute(
        &self,
        metrics: &dyn FontMetrics,
        font: &FontRef,
        sizes: &[f64],
        available: f64,
    ) -> Vec<Extent> {
        let mut extents: Vec<Extent> = self
            .items
            .iter()
            .zip(sizes)
            .map(|(item, size)| Extent {
                size: item.measure(metrics, font, *size),
                broken: false,
            })
            .collect();

        let fixed: f64 = self
            .items
            .iter()
            .zip(&extents)
            .filter(|(item, _)| !item.is_variable())
            .map(|(_, extent)| extent.size.width)
            .sum();

        let mut order: SmallVec<[(u8, usize); 4]> = self
            .items
            .iter()
            .filter_map(|item| match item.class {
                ItemClass::Variable { priority } => Some((priority, item.index)),
                _ => None,
            })
            .collect();
        order.sort_by_key(|&(priority, index)| (Reverse(priority), index));

        let mut remaining = available - fixed;
        let mut count = order.len();
        for (_, index) in order {
            let item = &self.items[index];
            let Node::Fragment(fragment) = &item.node.node else {
                continue;
            };
            let size = sizes.get(index).copied().unwrap_or(0.0);
            let floor = min_width(fragment.kind, &fragment.params, size);
            let offer = (remaining / count as f64).max(floor);
            let extent = offered_extent(fragment.kind, &fragment.params, size, offer);
            tracing::trace!(
                kind = %fragment.kind,
                offer,
                width = extent.size.width,
                broken = extent.broken,
                "allocated variable width"
            );
            remaining -= extent.size.width;
            count -= 1;
            extents[index] = extent;
        }
        extents
    }
}
