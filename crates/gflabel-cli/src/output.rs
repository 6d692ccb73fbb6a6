#![forbid(unsafe_code)]

//! JSON placement output.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gflabel_core::{Candidate, LabelError, LayoutOverflowWarning, Rect, RenderOptions, Span};
use gflabel_layout::{
    ColumnLayout, GeometryBackend, LabelOutcome, PlacementRecord, RenderedLabel, SheetSpec,
};
use gflabel_text::FontRef;
use serde::Serialize;

use crate::bases::BaseArea;
use crate::error::{CliError, Result};

/// Extensions that belong to a solid-modelling backend.
const GEOMETRY_FORMATS: &[&str] = &["step", "stp", "stl", "svg"];

// =========================================================================
// Targets
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Json(PathBuf),
    Stdout,
}

impl OutputTarget {
    /// Classify an `--output` value; `-` is stdout.
    pub fn parse(path: &Path) -> Result<Self> {
        if path.as_os_str() == "-" {
            return Ok(Self::Stdout);
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if extension == "json" {
            return Ok(Self::Json(path.to_path_buf()));
        }
        if GEOMETRY_FORMATS.contains(&extension.as_str()) {
            return Err(CliError::UnsupportedOutput {
                path: path.to_path_buf(),
                format: extension,
            });
        }
        Err(CliError::invalid(format!(
            "unrecognised output '{}'; use a .json path or -",
            path.display()
        )))
    }

    pub fn write(&self, document: &PlacementDocument) -> Result<()> {
        match self {
            Self::Json(path) => {
                let mut json = serde_json::to_vec_pretty(document)?;
                json.push(b'\n');
                fs::write(path, json)?;
                tracing::info!(path = %path.display(), labels = document.labels.len(), "wrote placements");
            }
            Self::Stdout => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                serde_json::to_writer_pretty(&mut lock, document)?;
                writeln!(lock)?;
            }
        }
        Ok(())
    }
}

// =========================================================================
// Backend
// =========================================================================

/// Geometry backend that turns placements into JSON values.
///
/// `label_color` is attached to records that carry no colour of their own.
#[derive(Debug, Default)]
pub struct JsonBackend {
    label_color: Option<String>,
    placed: Vec<serde_json::Value>,
}

impl JsonBackend {
    pub fn new(label_color: Option<String>) -> Self {
        Self {
            label_color,
            placed: Vec::new(),
        }
    }

    pub fn take(&mut self) -> Vec<serde_json::Value> {
        std::mem::take(&mut self.placed)
    }
}

impl GeometryBackend for JsonBackend {
    type Handle = usize;
    type Error = serde_json::Error;

    fn place(&mut self, record: &PlacementRecord) -> std::result::Result<usize, serde_json::Error> {
        let mut value = serde_json::to_value(record)?;
        if let (Some(color), Some(attributes)) = (
            &self.label_color,
            value.get_mut("attributes").and_then(|a| a.as_object_mut()),
        ) {
            attributes
                .entry("color")
                .or_insert_with(|| serde_json::Value::String(color.clone()));
        }
        self.placed.push(value);
        Ok(self.placed.len() - 1)
    }
}

// =========================================================================
// Document
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    pub kind: &'static str,
    pub message: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

impl From<&LabelError> for FailureDetail {
    fn from(error: &LabelError) -> Self {
        let candidates = match error {
            LabelError::AmbiguousFragment { candidates, .. } => candidates.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            span: error.span(),
            candidates,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LabelEntry {
    Ok {
        index: usize,
        text: String,
        area: Rect,
        font: FontRef,
        columns: Vec<ColumnLayout>,
        /// Visible placements, as handed to the backend.
        placements: Vec<serde_json::Value>,
        warnings: Vec<LayoutOverflowWarning>,
    },
    Error {
        index: usize,
        text: String,
        error: FailureDetail,
    },
}

impl LabelEntry {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    fn rendered(label: RenderedLabel, backend: &mut JsonBackend) -> Result<Self> {
        label.emit(backend)?;
        Ok(Self::Ok {
            index: label.index,
            text: label.text,
            area: label.area,
            font: label.font,
            columns: label.columns,
            placements: backend.take(),
            warnings: label.warnings,
        })
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementDocument {
    pub base: BaseArea,
    pub options: RenderOptions,
    pub sheet: SheetSpec,
    /// Pass-through attributes for the whole label body.
    pub attributes: BTreeMap<String, String>,
    pub labels: Vec<LabelEntry>,
}

impl PlacementDocument {
    pub fn build(
        base: BaseArea,
        options: RenderOptions,
        sheet: SheetSpec,
        colors: Colors,
        outcomes: Vec<LabelOutcome>,
    ) -> Result<Self> {
        let mut backend = JsonBackend::new(colors.label);
        let labels = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Ok(label) => LabelEntry::rendered(label, &mut backend),
                Err(failure) => Ok(LabelEntry::Error {
                    index: failure.index,
                    error: FailureDetail::from(&failure.error),
                    text: failure.text,
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut attributes = BTreeMap::new();
        if let Some(color) = colors.base {
            attributes.insert("base_color".to_string(), color);
        }
        Ok(Self {
            base,
            options,
            sheet,
            attributes,
            labels,
        })
    }

    pub fn failures(&self) -> usize {
        self.labels.iter().filter(|entry| entry.is_error()).count()
    }
}

/// `--base-color` and `--label-color`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Colors {
    pub base: Option<String>,
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflabel_core::{LocalTransform, Size};
    use gflabel_layout::PlacedContent;

    #[test]
    fn output_targets_by_extension() {
        assert_eq!(
            OutputTarget::parse(Path::new("out/label.JSON")).unwrap(),
            OutputTarget::Json(PathBuf::from("out/label.JSON"))
        );
        assert_eq!(OutputTarget::parse(Path::new("-")).unwrap(), OutputTarget::Stdout);
        for path in ["label.step", "label.stl", "label.svg"] {
            let error = OutputTarget::parse(Path::new(path)).unwrap_err();
            assert!(matches!(error, CliError::UnsupportedOutput { .. }), "{path}");
        }
        let error = OutputTarget::parse(Path::new("label.txt")).unwrap_err();
        assert!(matches!(error, CliError::InvalidOption { .. }));
    }

    fn record(attributes: BTreeMap<String, String>) -> PlacementRecord {
        let rect = Rect::from_size(Size::new(3.0, 3.0));
        PlacementRecord {
            column: 0,
            line: 0,
            item: 0,
            content: PlacedContent::Text { text: "M3".into() },
            rect,
            transform: LocalTransform::IDENTITY,
            transformed: rect,
            z: 0.0,
            scale: 1.0,
            size_mm: 3.0,
            visible: true,
            attributes,
        }
    }

    #[test]
    fn label_color_fills_missing_color_only() {
        let mut backend = JsonBackend::new(Some("red".into()));
        backend.place(&record(BTreeMap::new())).unwrap();
        let own = BTreeMap::from([("color".to_string(), "blue".to_string())]);
        backend.place(&record(own)).unwrap();

        let placed = backend.take();
        assert_eq!(placed[0]["attributes"]["color"], "red");
        assert_eq!(placed[1]["attributes"]["color"], "blue");
        assert!(backend.take().is_empty());
    }

    #[test]
    fn failure_detail_keeps_candidates() {
        let error = LabelError::AmbiguousFragment {
            name: "tr".into(),
            span: Span::default(),
            candidates: vec![Candidate::named("a"), Candidate::named("b")],
        };
        let detail = FailureDetail::from(&error);
        assert_eq!(detail.kind, error.kind());
        assert_eq!(detail.candidates.len(), 2);

        let json = serde_json::to_value(LabelEntry::Error {
            index: 0,
            text: "{tr}".into(),
            error: detail,
        })
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["candidates"][1]["id"], "b");
    }
}
