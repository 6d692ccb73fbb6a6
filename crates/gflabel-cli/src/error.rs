use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid option: {message}")]
    InvalidOption { message: String },

    #[error(
        "cannot write {}: {format} output needs a geometry backend, only .json placements are written here",
        path.display()
    )]
    UnsupportedOutput { path: PathBuf, format: String },

    #[error("{failed} of {total} labels failed")]
    LabelsFailed { failed: usize, total: usize },
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Bad option combinations exit 2, like clap's own usage errors.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidOption { .. } | Self::UnsupportedOutput { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOption {
            message: message.into(),
        }
    }
}
