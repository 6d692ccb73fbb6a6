#![forbid(unsafe_code)]

//! The `gflabel` command line tool.
//!
//! Resolves the label area from a base kind, lays out every label string
//! with [`gflabel_layout::LabelEngine`], and writes the placement records
//! as JSON for a geometry backend to build from.

pub mod bases;
pub mod cli;
pub mod error;
pub mod listing;
pub mod logging;
pub mod output;

pub use cli::{Cli, run, run_from_env};
pub use error::{CliError, Result};
