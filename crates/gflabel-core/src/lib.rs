#![forbid(unsafe_code)]

//! Core types shared by every gflabel crate.
//!
//! All lengths are millimetres. Label-space coordinates put the origin at
//! the centre of the label area with y pointing up, matching the frame the
//! geometry backend builds sketches in.

pub mod error;
pub mod geometry;
pub mod options;

pub use error::{
    Candidate, LabelError, LayoutOverflowWarning, OverflowAxis, Position, Result, Span,
};
pub use geometry::{LocalTransform, Rect, Sides, Size, Vec2};
pub use options::{FontOptions, FontSizing, FontStyle, LabelStyle, RenderOptions};
