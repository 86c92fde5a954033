//! Typed error handling for tofulint.
//!
//! Library consumers can match on these instead of an opaque `anyhow::Error`.
//! Fix errors are split out so the runner can recover from them per issue.

use crate::syntax::Range;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tofulint operations.
#[derive(Error, Debug)]
pub enum TofulintError {
    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Syntax error in a configuration file
    #[error("Parse error in {path}:{line},{column}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        line: usize,
        column: usize,
    },

    /// Structurally invalid configuration, such as a block with the wrong number of labels
    #[error("{range}: {summary}; {detail}")]
    Diagnostic {
        range: Range,
        summary: String,
        detail: String,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Fix operation errors
    #[error("Fix error: {message}")]
    Fix { message: String },

    /// The file cannot be rewritten (JSON syntax)
    #[error("Fix not supported for {path}")]
    FixNotSupported { path: String },

    /// The edit overlaps an edit already queued for the same file
    #[error("Fix conflict in {path}: {message}")]
    FixConflict { path: String, message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Path traversal or security error
    #[error("Security error: {message}")]
    Security { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TofulintError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a parse error with location.
    pub fn parse(
        path: impl Into<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line,
            column,
        }
    }

    pub fn diagnostic(range: &Range, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Diagnostic {
            range: range.clone(),
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a fix error.
    pub fn fix(message: impl Into<String>) -> Self {
        Self::Fix {
            message: message.into(),
        }
    }

    pub fn fix_not_supported(path: impl Into<String>) -> Self {
        Self::FixNotSupported { path: path.into() }
    }

    pub fn fix_conflict(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FixConflict {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a security error.
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error (the issue is kept, only its fix is dropped).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FixNotSupported { .. } | Self::FixConflict { .. } | Self::Config { .. }
        )
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            Self::Io { path, .. } | Self::Parse { path, .. } | Self::Config { path, .. } => {
                Some(path.clone())
            }
            Self::Diagnostic { range, .. } => Some(PathBuf::from(&range.filename)),
            Self::FixNotSupported { path } | Self::FixConflict { path, .. } => {
                Some(PathBuf::from(path))
            }
            _ => None,
        }
    }
}

/// Convenience type alias for tofulint results.
pub type TofulintResult<T> = Result<T, TofulintError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> TofulintResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> TofulintResult<T> {
        self.map_err(|e| TofulintError::io(path, e))
    }
}
