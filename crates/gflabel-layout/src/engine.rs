#![forbid(unsafe_code)]

//! The per-label pipeline and sheet rendering.
//!
//! A label goes parse, structure, columns, per-line overheight scan, fit,
//! width distribution, placement. Every step is a pure function of the
//! source, the options and the area, so rendering the same label twice
//! gives identical records.

use std::num::NonZeroUsize;

use gflabel_core::{
    LabelError, LayoutOverflowWarning, OverflowAxis, Rect, RenderOptions, Sides, Size, Vec2,
};
use gflabel_fragments::FragmentRegistry;
use gflabel_parse::{ColumnAlign, LabelAst, Node, parse};
use gflabel_text::{FontMetrics, FontRef};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::columns::{ColumnFlex, line_slots};
use crate::fit::{FitRequest, FitResolver};
use crate::line::LineContent;
use crate::overheight::OverheightCoordinator;
use crate::placement::{GeometryBackend, PlacedContent, PlacementRecord};

// =========================================================================
// Results
// =========================================================================

/// How one line was sized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineLayout {
    /// Vertical slot the line is centred in.
    pub slot: Rect,
    /// Size chosen by the fit search, in mm.
    pub size: f64,
    /// `size` relative to the row size.
    pub fit_scale: f64,
    /// Factor applied to ordinary items next to an overheight fragment.
    pub shrink: f64,
    pub iterations: u32,
    pub searched: bool,
    /// Width of the placed items.
    pub content_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnLayout {
    pub rect: Rect,
    pub proportion: f64,
    pub align: ColumnAlign,
    /// Nominal line size before fitting.
    pub row_size: f64,
    /// Tallest ordinary item of any line at the row size.
    ///
    /// Reported for diagnostics only; line sizes come from the fit search
    /// and are never limited by this value.
    pub row_height: f64,
    pub lines: Vec<LineLayout>,
}

/// Placements and diagnostics for one label string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedLabel {
    /// Position of the label in its batch.
    pub index: usize,
    pub text: String,
    /// Content area the label was laid out in.
    pub area: Rect,
    pub font: FontRef,
    pub columns: Vec<ColumnLayout>,
    pub placements: Vec<PlacementRecord>,
    pub warnings: Vec<LayoutOverflowWarning>,
}

impl RenderedLabel {
    fn empty(index: usize, text: &str, area: Rect, font: FontRef) -> Self {
        Self {
            index,
            text: text.to_string(),
            area,
            font,
            columns: Vec::new(),
            placements: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Placements of one line, in item order.
    pub fn line(&self, column: usize, line: usize) -> impl Iterator<Item = &PlacementRecord> {
        self.placements
            .iter()
            .filter(move |record| record.column == column && record.line == line)
    }

    /// Hand every visible placement to `backend`, in order.
    pub fn emit<B: GeometryBackend>(&self, backend: &mut B) -> Result<Vec<B::Handle>, B::Error> {
        self.placements
            .iter()
            .filter(|record| record.visible)
            .map(|record| backend.place(record))
            .collect()
    }
}

/// A label of a batch that could not be rendered.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("label {} ({text:?}): {error}", .index + 1)]
pub struct LabelFailure {
    pub index: usize,
    pub text: String,
    pub error: LabelError,
}

pub type LabelOutcome = Result<RenderedLabel, LabelFailure>;

/// Physical label dimensions for batch rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetSpec {
    /// Area of one physical label, before margins.
    pub label_size: Size,
    /// Label strings per physical label; 0 puts all of them on one.
    pub divisions: usize,
    /// Vertical distance between stacked physical labels.
    pub label_gap_mm: f64,
}

// =========================================================================
// Engine
// =========================================================================

/// Lays out labels against a registry and a metrics capability.
///
/// Both are shared read-only, so one engine can serve several threads.
pub struct LabelEngine<'a> {
    registry: &'a FragmentRegistry,
    metrics: &'a dyn FontMetrics,
    options: RenderOptions,
    font: FontRef,
    coordinator: OverheightCoordinator,
    resolver: FitResolver,
}

struct LineFrame {
    column: usize,
    line: usize,
    slot: Rect,
    row: f64,
    align: ColumnAlign,
}

impl<'a> LabelEngine<'a> {
    pub fn new(
        registry: &'a FragmentRegistry,
        metrics: &'a dyn FontMetrics,
        options: RenderOptions,
    ) -> Self {
        Self {
            registry,
            metrics,
            font: FontRef::from(&options.font),
            coordinator: OverheightCoordinator::new(options.allow_overheight),
            resolver: FitResolver::default(),
            options,
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: FitResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn registry(&self) -> &FragmentRegistry {
        self.registry
    }

    /// Parse and lay out `text` inside `area`, less the configured margin.
    pub fn render(&self, text: &str, area: Rect) -> Result<RenderedLabel, LabelError> {
        let content = area.inner(Sides::all(self.options.margin_mm));
        self.render_at(0, text, content)
    }

    /// Parse and lay out `text` filling `content` exactly.
    pub fn render_at(
        &self,
        index: usize,
        text: &str,
        content: Rect,
    ) -> Result<RenderedLabel, LabelError> {
        let ast = parse(text, self.registry)?;
        Ok(self.layout(index, &ast, content))
    }

    /// Lay out a parsed label. Never fails; overflow becomes warnings.
    pub fn layout(&self, index: usize, ast: &LabelAst, content: Rect) -> RenderedLabel {
        let tree = ast.structure();
        let _span = tracing::debug_span!(
            "layout",
            label = index,
            columns = tree.columns.len(),
            lines = tree.line_count()
        )
        .entered();

        let rects = ColumnFlex::new(tree.columns.iter().map(|column| column.proportion))
            .gap(self.options.column_gap_mm)
            .split(content);

        let mut label = RenderedLabel::empty(index, &ast.source, content, self.font.clone());

        for (column_index, (column, rect)) in tree.columns.iter().zip(rects.iter()).enumerate() {
            let slots = line_slots(*rect, column.lines.len(), self.options.line_spacing_mm);
            let slot_height = slots.first().map_or(0.0, |slot| slot.height);
            let row = self.options.font.allowed_height(slot_height);

            let mut row_height = 0.0_f64;
            let mut lines = Vec::with_capacity(column.lines.len());
            for (line_index, (line, slot)) in column.lines.iter().zip(slots.iter()).enumerate() {
                let items = LineContent::classify(line, self.registry);
                row_height = row_height.max(items.natural_height(self.metrics, &self.font, row));
                let frame = LineFrame {
                    column: column_index,
                    line: line_index,
                    slot: *slot,
                    row,
                    align: column.align,
                };
                lines.push(self.layout_line(&frame, &items, &mut label));
            }

            tracing::trace!(
                column = column_index,
                width = rect.width,
                row,
                row_height,
                "column laid out"
            );
            label.columns.push(ColumnLayout {
                rect: *rect,
                proportion: column.proportion,
                align: column.align,
                row_size: row,
                row_height,
                lines,
            });
        }

        for warning in &label.warnings {
            tracing::warn!(
                label = index,
                column = warning.column + 1,
                line = warning.line + 1,
                axis = %warning.axis,
                required_mm = warning.required_mm,
                available_mm = warning.available_mm,
                "layout overflow"
            );
        }
        tracing::debug!(
            label = index,
            placements = label.placements.len(),
            warnings = label.warnings.len(),
            "label laid out"
        );
        label
    }

    fn layout_line(
        &self,
        frame: &LineFrame,
        content: &LineContent<'_>,
        label: &mut RenderedLabel,
    ) -> LineLayout {
        let fixed = self.options.font.sizing.is_fixed();
        let row = frame.row;
        let shrink = self.coordinator.scan(content, row, frame.slot.height, fixed);
        let bases: SmallVec<[f64; 8]> = shrink.bases().collect();
        let fit_scale_at = |size: f64| if row > 0.0 { size / row } else { 1.0 };

        let mut sizes = bases.clone();
        let outcome = self.resolver.resolve(
            FitRequest {
                upper: row,
                available: frame.slot.size(),
                fixed,
            },
            |size| {
                let k = fit_scale_at(size);
                for (scaled, base) in sizes.iter_mut().zip(&bases) {
                    *scaled = base * k;
                }
                content.extent(self.metrics, &self.font, &sizes)
            },
        );

        let k = fit_scale_at(outcome.size);
        for (scaled, base) in sizes.iter_mut().zip(&bases) {
            *scaled = base * k;
        }
        let extents = content.distribute(self.metrics, &self.font, &sizes, frame.slot.width);
        let total: f64 = extents.iter().map(|extent| extent.size.width).sum();

        let mut x = match frame.align {
            ColumnAlign::Left => frame.slot.left(),
            ColumnAlign::Right => frame.slot.right() - total,
            ColumnAlign::Center => frame.slot.x + (frame.slot.width - total) / 2.0,
        };
        let centre_y = frame.slot.center().y;
        let content_z = self.options.content_z();

        for ((item, extent), base) in content.items.iter().zip(&extents).zip(&shrink.items) {
            let rect = Rect::new(
                x,
                centre_y - extent.size.height / 2.0,
                extent.size.width,
                extent.size.height,
            );
            x += extent.size.width;

            let (placed, visible, modifiers) = match &item.node.node {
                Node::TextRun { text } => (
                    PlacedContent::Text { text: text.clone() },
                    !text.trim().is_empty(),
                    None,
                ),
                Node::Gap { width_mm } => (PlacedContent::Gap { width_mm: *width_mm }, false, None),
                Node::Fragment(fragment) => (
                    PlacedContent::Fragment {
                        kind: fragment.kind,
                        params: fragment.params.clone(),
                        broken: extent.broken,
                    },
                    fragment.kind.is_visible(),
                    Some(&fragment.modifiers),
                ),
                Node::ColumnSeparator { .. } | Node::Align { .. } | Node::Newline => continue,
            };
            let transform = modifiers.map(|m| m.transform).unwrap_or_default();
            let attributes = modifiers.map(|m| m.attributes.clone()).unwrap_or_default();

            label.placements.push(PlacementRecord {
                column: frame.column,
                line: frame.line,
                item: item.index,
                content: placed,
                rect,
                transform,
                transformed: transform.apply(rect),
                z: content_z + transform.z_offset,
                scale: base.scale * k,
                size_mm: sizes[item.index],
                visible,
                attributes,
            });
        }

        // Distribution can place wider than the fit measured; report it once.
        let mut overflows = outcome.overflow.clone();
        let placed_overflow = self
            .resolver
            .width_overflow(total, frame.slot.width)
            .filter(|_| !overflows.iter().any(|o| o.axis == OverflowAxis::Width));
        if let Some(overflow) = placed_overflow {
            tracing::debug!(
                column = frame.column,
                line = frame.line,
                required = total,
                available = frame.slot.width,
                "placed width overflows the slot"
            );
            overflows.push(overflow);
        }
        label
            .warnings
            .extend(overflows.iter().map(|overflow| LayoutOverflowWarning {
                column: frame.column,
                line: frame.line,
                axis: overflow.axis,
                required_mm: overflow.required_mm,
                available_mm: overflow.available_mm,
            }));

        tracing::trace!(
            column = frame.column,
            line = frame.line,
            row,
            size = outcome.size,
            iterations = outcome.iterations,
            shrink = shrink.shrink,
            "line fitted"
        );

        LineLayout {
            slot: frame.slot,
            size: outcome.size,
            fit_scale: k,
            shrink: shrink.shrink,
            iterations: outcome.iterations,
            searched: outcome.searched,
            content_width: total,
        }
    }

    // =====================================================================
    // Sheets
    // =====================================================================

    /// Content area of each of `count` labels on a sheet.
    ///
    /// Each physical label loses the margin on every side and is split
    /// into equal-width divisions, filled left to right. Further physical
    /// labels stack downwards with pitch `height + label_gap`.
    pub fn division_areas(&self, count: usize, sheet: &SheetSpec) -> Vec<Rect> {
        let divisions = if sheet.divisions == 0 {
            count.max(1)
        } else {
            sheet.divisions
        };
        let pitch = sheet.label_size.height + sheet.label_gap_mm;
        let margin = Sides::all(self.options.margin_mm);

        (0..count)
            .map(|index| {
                let physical = index / divisions;
                let slot = index % divisions;
                let outline = Rect::centered(
                    Vec2::new(0.0, -(physical as f64) * pitch),
                    sheet.label_size,
                );
                let inner = outline.inner(margin);
                let width = inner.width / divisions as f64;
                Rect::new(inner.x + width * slot as f64, inner.y, width, inner.height)
            })
            .collect()
    }

    fn render_division(&self, index: usize, text: &str, area: Rect) -> LabelOutcome {
        if text.trim().is_empty() {
            tracing::debug!(label = index, "blank label leaves its division empty");
            return Ok(RenderedLabel::empty(index, text, area, self.font.clone()));
        }
        self.render_at(index, text, area).map_err(|error| {
            tracing::warn!(label = index, kind = error.kind(), %error, "label failed");
            LabelFailure {
                index,
                text: text.to_string(),
                error,
            }
        })
    }

    /// Render a batch of labels one after another.
    ///
    /// A failing label yields its own `Err` and does not stop the others.
    pub fn render_sheet<S: AsRef<str>>(&self, labels: &[S], sheet: &SheetSpec) -> Vec<LabelOutcome> {
        let _span = tracing::info_span!("sheet", labels = labels.len()).entered();
        let areas = self.division_areas(labels.len(), sheet);
        labels
            .iter()
            .zip(areas)
            .enumerate()
            .map(|(index, (text, area))| self.render_division(index, text.as_ref(), area))
            .collect()
    }

    /// [`render_sheet`](Self::render_sheet) spread over up to `threads`
    /// scoped threads. Results come back in label order and match the
    /// sequential ones exactly.
    pub fn render_sheet_parallel<S: AsRef<str> + Sync>(
        &self,
        labels: &[S],
        sheet: &SheetSpec,
        threads: NonZeroUsize,
    ) -> Vec<LabelOutcome> {
        let _span =
            tracing::info_span!("sheet", labels = labels.len(), threads = threads.get()).entered();
        let areas = self.division_areas(labels.len(), sheet);
        let chunk = labels.len().div_ceil(threads.get()).max(1);

        std::thread::scope(|scope| {
            let handles: Vec<_> = labels
                .chunks(chunk)
                .zip(areas.chunks(chunk))
                .enumerate()
                .map(|(batch, (texts, rects))| {
                    scope.spawn(move || {
                        texts
                            .iter()
                            .zip(rects)
                            .enumerate()
                            .map(|(offset, (text, area))| {
                                self.render_division(batch * chunk + offset, text.as_ref(), *area)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut outcomes = Vec::with_capacity(labels.len());
            for handle in handles {
                match handle.join() {
                    Ok(batch) => outcomes.extend(batch),
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
            outcomes
        })
    }
}
