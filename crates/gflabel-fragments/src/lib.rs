#![forbid(unsafe_code)]

//! Fragment kinds and everything needed to size them.
//!
//! A fragment is a `{name(args)}` directive inside a label string. This
//! crate owns the closed set of kinds, the immutable [`FragmentRegistry`]
//! that resolves names to descriptors, argument binding into typed
//! [`FragmentParams`], and the extents layout asks for.

pub mod drives;
pub mod params;
pub mod registry;
pub mod sizing;
pub mod symbols;

pub use drives::{BoltSpec, Drive, HeadShape};
pub use params::{Arg, FragmentParams, SymbolRef, bind};
pub use registry::{
    Capabilities, DescriptionRow, FragmentDescriptor, FragmentKind, FragmentRegistry,
};
pub use sizing::{Extent, intrinsic_size, min_width, offered_extent};
pub use symbols::{Standard, SymbolEntry, SymbolMatcher, manifest};
