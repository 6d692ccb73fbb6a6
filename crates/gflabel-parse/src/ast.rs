#![forbid(unsafe_code)]

//! Parsed label representation.
//!
//! [`LabelAst`] is the flat node sequence the parser produces. The
//! structural pass, [`LabelAst::structure`], groups it into columns and
//! lines for layout.

use std::collections::BTreeMap;
use std::fmt;

use gflabel_core::{LocalTransform, Span};
use gflabel_fragments::{Arg, FragmentKind, FragmentParams};
use serde::Serialize;

/// Which edge every line of a column packs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMarker {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAlign {
    #[default]
    Center,
    Left,
    Right,
}

impl From<AlignMarker> for ColumnAlign {
    fn from(marker: AlignMarker) -> Self {
        match marker {
            AlignMarker::Left => Self::Left,
            AlignMarker::Right => Self::Right,
        }
    }
}

/// Modifier chain of a directive: local transform plus pass-through
/// attributes such as `color`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Modifiers {
    pub transform: LocalTransform,
    pub attributes: BTreeMap<String, String>,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        self.transform.is_identity() && self.attributes.is_empty()
    }
}

/// A resolved `{name(args)}` directive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentRef {
    /// Name as written in the source.
    pub name: String,
    pub kind: FragmentKind,
    pub args: Vec<Arg>,
    pub params: FragmentParams,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    TextRun { text: String },
    Fragment(FragmentRef),
    /// Blank space of a fixed width in mm.
    Gap { width_mm: f64 },
    ColumnSeparator { left: f64, right: f64 },
    Align { marker: AlignMarker },
    Newline,
}

impl Node {
    fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ColumnSeparator { .. } | Self::Align { .. } | Self::Newline
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpannedNode {
    pub node: Node,
    pub span: Span,
}

impl fmt::Display for SpannedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::TextRun { text } => write!(f, "{text:?}"),
            Node::Fragment(fragment) => {
                write!(f, "{{{}", fragment.kind)?;
                if !fragment.args.is_empty() {
                    let args: Vec<String> = fragment.args.iter().map(ToString::to_string).collect();
                    write!(f, "({})", args.join(","))?;
                }
                write!(f, "}}")
            }
            Node::Gap { width_mm } => write!(f, "{{{width_mm}}}"),
            Node::ColumnSeparator { left, right } => write!(f, "{{{left}|{right}}}"),
            Node::Align { marker: AlignMarker::Left } => write!(f, "{{<}}"),
            Node::Align { marker: AlignMarker::Right } => write!(f, "{{>}}"),
            Node::Newline => write!(f, "\\n"),
        }
    }
}

/// Flat parse result of one label string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelAst {
    pub source: String,
    pub nodes: Vec<SpannedNode>,
}

/// One visual row of a column. Holds no structural nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Line {
    pub items: Vec<SpannedNode>,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Relative width; see [`LabelTree::fractions`].
    pub proportion: f64,
    pub align: ColumnAlign,
    pub lines: Vec<Line>,
}

impl Column {
    fn new(proportion: f64) -> Self {
        Self {
            proportion,
            align: ColumnAlign::Center,
            lines: vec![Line::default()],
        }
    }
}

/// Columns of lines of items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelTree {
    pub columns: Vec<Column>,
}

impl LabelTree {
    /// Column proportions normalised to sum to one.
    pub fn fractions(&self) -> Vec<f64> {
        let total: f64 = self.columns.iter().map(|column| column.proportion).sum();
        self.columns
            .iter()
            .map(|column| column.proportion / total)
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.columns.iter().map(|column| column.lines.len()).sum()
    }
}

impl LabelAst {
    /// Group the node sequence into columns and lines.
    ///
    /// The first separator `{a|b}` sets the first two proportions to `a`
    /// and `b`. Each later separator `{c|d}` is relative to the column
    /// before it: the new column gets `d / c` times that column's
    /// proportion.
    pub fn structure(&self) -> LabelTree {
        let mut columns = vec![Column::new(1.0)];
        let mut first_separator = true;

        for spanned in &self.nodes {
            match &spanned.node {
                Node::ColumnSeparator { left, right } => {
                    let proportion = if first_separator {
                        first_separator = false;
                        if let Some(first) = columns.first_mut() {
                            first.proportion = *left;
                        }
                        *right
                    } else {
                        let previous = columns.last().map_or(1.0, |column| column.proportion);
                        right / left * previous
                    };
                    columns.push(Column::new(proportion));
                }
                Node::Align { marker } => {
                    if let Some(column) = columns.last_mut() {
                        column.align = (*marker).into();
                    }
                }
                Node::Newline => {
                    if let Some(column) = columns.last_mut() {
                        column.lines.push(Line::default());
                    }
                }
                node => {
                    debug_assert!(!node.is_structural());
                    if let Some(line) = columns.last_mut().and_then(|c| c.lines.last_mut()) {
                        line.items.push(spanned.clone());
                    }
                }
            }
        }

        LabelTree { columns }
    }
}
