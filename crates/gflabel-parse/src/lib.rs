#![forbid(unsafe_code)]

//! The gflabel label language.
//!
//! ```text
//! {<}M3{|}{head(hex)} {bolt(12, countersunk)}\nsocket cap
//! ```
//!
//! [`parse`] turns a label string into a flat [`LabelAst`];
//! [`LabelAst::structure`] groups it into the [`LabelTree`] of columns and
//! lines that layout consumes.

pub mod ast;
pub mod parser;

pub use ast::{
    AlignMarker, Column, ColumnAlign, FragmentRef, LabelAst, LabelTree, Line, Modifiers, Node,
    SpannedNode,
};
pub use parser::parse;
