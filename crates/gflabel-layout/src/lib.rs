#![forbid(unsafe_code)]

//! Label layout.
//!
//! Turns a parsed label into [`PlacementRecord`]s: columns from the
//! separator proportions, equal line slots per column, an overheight scan
//! per line, a bounded fit search, then width distribution and alignment.
//! [`LabelEngine`] runs the whole pipeline for single labels and for
//! divided sheets of many labels.

pub mod columns;
pub mod engine;
pub mod fit;
pub mod line;
pub mod overheight;
pub mod placement;

pub use columns::{ColumnFlex, line_slots};
pub use engine::{
    ColumnLayout, LabelEngine, LabelFailure, LabelOutcome, LineLayout, RenderedLabel, SheetSpec,
};
pub use fit::{FitOutcome, FitOverflow, FitRequest, FitResolver};
pub use line::{ItemClass, LineContent, LineItem};
pub use overheight::{ItemBase, LineShrink, OverheightCoordinator};
pub use placement::{GeometryBackend, PlacedContent, PlacementRecord, RecordingBackend};
