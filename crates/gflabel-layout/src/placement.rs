#![forbid(unsafe_code)]

//! Placement records and the geometry backend seam.

use std::collections::BTreeMap;
use std::convert::Infallible;

use gflabel_core::{LocalTransform, Rect};
use gflabel_fragments::{FragmentKind, FragmentParams};
use serde::Serialize;

/// What a placement draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacedContent {
    /// A text run, drawn with the label's font at `size_mm`.
    Text { text: String },
    /// Fixed blank space.
    Gap { width_mm: f64 },
    Fragment {
        kind: FragmentKind,
        params: FragmentParams,
        /// A bolt drawn shorter than its length.
        broken: bool,
    },
}

impl PlacedContent {
    /// Registry name for fragments, `text` or `gap` otherwise.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Gap { .. } => "gap",
            Self::Fragment { kind, .. } => kind.name(),
        }
    }
}

/// Final box of one line item, ready for the geometry backend.
///
/// Coordinates are millimetres with the origin at the centre of the label
/// area and y up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementRecord {
    pub column: usize,
    pub line: usize,
    /// Position among the line's items.
    pub item: usize,
    pub content: PlacedContent,
    /// Box assigned by layout.
    pub rect: Rect,
    /// Modifier transform of the directive.
    pub transform: LocalTransform,
    /// `rect` after the modifier transform.
    pub transformed: Rect,
    /// Height of the content plane.
    pub z: f64,
    /// Size relative to the line's row size.
    pub scale: f64,
    /// Line size the item was laid out at.
    pub size_mm: f64,
    pub visible: bool,
    /// Pass-through attributes such as `color`.
    pub attributes: BTreeMap<String, String>,
}

/// Consumer of placement records, such as a solid modeller.
///
/// Layout never builds geometry itself; it hands every visible record to a
/// backend in line order and keeps whatever handle comes back.
pub trait GeometryBackend {
    /// Opaque reference to the geometry created for one record.
    type Handle;

    /// Backend-specific error type.
    type Error: core::fmt::Debug + core::fmt::Display;

    fn place(&mut self, record: &PlacementRecord) -> Result<Self::Handle, Self::Error>;
}

/// Backend that keeps clones of everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    pub records: Vec<PlacementRecord>,
}

impl GeometryBackend for RecordingBackend {
    type Handle = usize;
    type Error = Infallible;

    fn place(&mut self, record: &PlacementRecord) -> Result<usize, Infallible> {
        self.records.push(record.clone());
        Ok(self.records.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflabel_core::Size;

    fn record(content: PlacedContent) -> PlacementRecord {
        let rect = Rect::from_size(Size::new(4.0, 2.0));
        PlacementRecord {
            column: 0,
            line: 0,
            item: 0,
            content,
            rect,
            transform: LocalTransform::IDENTITY,
            transformed: rect,
            z: 0.0,
            scale: 1.0,
            size_mm: 2.0,
            visible: true,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(
            PlacedContent::Text {
                text: "M3".into()
            }
            .kind_name(),
            "text"
        );
        let nut = PlacedContent::Fragment {
            kind: FragmentKind::HexNut,
            params: FragmentParams::None,
            broken: false,
        };
        assert_eq!(nut.kind_name(), "hexnut");
    }

    #[test]
    fn recording_backend_hands_out_indices() {
        let mut backend = RecordingBackend::default();
        let first = backend.place(&record(PlacedContent::Gap { width_mm: 1.0 }));
        let second = backend.place(&record(PlacedContent::Text { text: "x".into() }));
        assert_eq!(first, Ok(0));
        assert_eq!(second, Ok(1));
        assert_eq!(backend.records.len(), 2);
    }

    #[test]
    fn content_serializes_with_type_tag() {
        let json = serde_json::to_value(record(PlacedContent::Text { text: "A".into() })).unwrap();
        assert_eq!(json["content"]["type"], "text");
        assert_eq!(json["content"]["text"], "A");
        assert_eq!(json["rect"]["width"], 4.0);
    }
}
