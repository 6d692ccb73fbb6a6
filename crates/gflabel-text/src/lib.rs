#![forbid(unsafe_code)]

//! Text measurement for label layout.
//!
//! Layout never touches glyph outlines. It asks a [`FontMetrics`]
//! implementation how large a run of text is at a candidate size and
//! searches for the size that fits. Implementations must be deterministic
//! and shareable across threads.

pub mod metrics;

pub use metrics::{AdvanceMetrics, FontMetrics, FontRef, MonospaceMetrics};
