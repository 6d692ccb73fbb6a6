#![forbid(unsafe_code)]

//! Error model.
//!
//! Every fatal condition is a [`LabelError`] scoped to one label string: the
//! caller drops that label and carries on with the rest of the batch. Each
//! variant carries a [`Span`] into the source string so the input can be
//! fixed. Overflow is never an error; it is reported as a
//! [`LayoutOverflowWarning`] next to the placements.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LabelError>;

/// A location in a label source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub col: usize,
    /// Byte offset from the start of the string.
    pub byte: usize,
}

impl Position {
    pub const START: Self = Self {
        line: 1,
        col: 1,
        byte: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span at a single position.
    pub fn point(at: Position) -> Self {
        Self::new(at, at)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, col {}", self.start.line, self.start.col)
    }
}

/// One possible resolution of an ambiguous name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Candidate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
}

impl Candidate {
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: None,
            standard: None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        match (&self.category, &self.standard) {
            (Some(category), Some(standard)) => write!(f, " [{category}, {standard}]"),
            (Some(category), None) => write!(f, " [{category}]"),
            (None, Some(standard)) => write!(f, " [{standard}]"),
            (None, None) => Ok(()),
        }
    }
}

fn join_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabelError {
    /// Malformed directive syntax: unbalanced braces, broken argument lists.
    #[error("syntax error ({span}): {message}")]
    Syntax { message: String, span: Span },

    #[error("unknown fragment '{name}' ({span})")]
    UnknownFragment { name: String, span: Span },

    /// Candidates are sorted by identifier.
    #[error("ambiguous fragment '{name}' ({span}); could be: {}", join_candidates(.candidates))]
    AmbiguousFragment {
        name: String,
        span: Span,
        candidates: Vec<Candidate>,
    },

    /// Misplaced alignment marker or a bad column ratio.
    #[error("invalid column specification ({span}): {message}")]
    InvalidColumnSpec { message: String, span: Span },

    /// A fragment rejected the values it was given.
    #[error("invalid arguments for '{fragment}' ({span}): {message}")]
    InvalidArguments {
        fragment: String,
        message: String,
        span: Span,
    },
}

impl LabelError {
    #[must_use]
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn column_spec(message: impl Into<String>, span: Span) -> Self {
        Self::InvalidColumnSpec {
            message: message.into(),
            span,
        }
    }

    /// Arguments error without a location yet; see [`LabelError::at`].
    #[must_use]
    pub fn arguments(fragment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            fragment: fragment.into(),
            message: message.into(),
            span: Span::default(),
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, at: Span) -> Self {
        match &mut self {
            Self::Syntax { span, .. }
            | Self::UnknownFragment { span, .. }
            | Self::AmbiguousFragment { span, .. }
            | Self::InvalidColumnSpec { span, .. }
            | Self::InvalidArguments { span, .. } => *span = at,
        }
        self
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Syntax { span, .. }
            | Self::UnknownFragment { span, .. }
            | Self::AmbiguousFragment { span, .. }
            | Self::InvalidColumnSpec { span, .. }
            | Self::InvalidArguments { span, .. } => *span,
        }
    }

    /// Stable short name of the error class, for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax",
            Self::UnknownFragment { .. } => "unknown-fragment",
            Self::AmbiguousFragment { .. } => "ambiguous-fragment",
            Self::InvalidColumnSpec { .. } => "invalid-column-spec",
            Self::InvalidArguments { .. } => "invalid-arguments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowAxis {
    Width,
    Height,
}

impl fmt::Display for OverflowAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width => write!(f, "width"),
            Self::Height => write!(f, "height"),
        }
    }
}

/// Content ended up larger than its box after fitting.
///
/// Rendering continues with the overflowing layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutOverflowWarning {
    pub column: usize,
    pub line: usize,
    pub axis: OverflowAxis,
    pub required_mm: f64,
    pub available_mm: f64,
}

impl fmt::Display for LayoutOverflowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column {} line {} overflows its {}: {:.2} mm > {:.2} mm",
            self.column + 1,
            self.line + 1,
            self.axis,
            self.required_mm,
            self.available_mm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(col: usize) -> Span {
        Span::point(Position {
            line: 1,
            col,
            byte: col - 1,
        })
    }

    #[test]
    fn ambiguous_message_lists_candidates() {
        let error = LabelError::AmbiguousFragment {
            name: "hex".to_string(),
            span: span_at(2),
            candidates: vec![Candidate::named("hexhead"), Candidate::named("hexnut")],
        };
        assert_eq!(
            error.to_string(),
            "ambiguous fragment 'hex' (line 1, col 2); could be: hexhead, hexnut"
        );
        assert_eq!(error.kind(), "ambiguous-fragment");
    }

    #[test]
    fn at_replaces_span() {
        let error = LabelError::arguments("bolt", "length must be a number").at(span_at(7));
        assert_eq!(error.span().start.col, 7);
        assert_eq!(
            error.to_string(),
            "invalid arguments for 'bolt' (line 1, col 7): length must be a number"
        );
    }

    #[test]
    fn candidate_display_includes_metadata() {
        let candidate = Candidate {
            id: "resistor-iec".to_string(),
            category: Some("Resistors".to_string()),
            standard: Some("IEC".to_string()),
        };
        assert_eq!(candidate.to_string(), "resistor-iec [Resistors, IEC]");
    }

    #[test]
    fn overflow_warning_display() {
        let warning = LayoutOverflowWarning {
            column: 0,
            line: 1,
            axis: OverflowAxis::Width,
            required_mm: 31.5,
            available_mm: 30.0,
        };
        assert_eq!(
            warning.to_string(),
            "column 1 line 2 overflows its width: 31.50 mm > 30.00 mm"
        );
    }
}
