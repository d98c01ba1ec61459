//! Error handling for the archaeopteryx CLI.
//!
//! - [`CliError`] is what commands return; it wraps core server errors
//! - [`ConfigError`] covers config file loading and interceptor lookup
//! - [`ResultExt`] attaches paths, hints and context while propagating
//!
//! `main` turns a [`CliError`] into a miette report via
//! [`cli_error_to_miette`], so every failure prints a message and exits
//! non-zero.

mod report;

pub use report::cli_error_to_miette;

use archaeopteryx::ServerError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (bad config file, unknown interceptor)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors from the server core
    #[error(transparent)]
    Server(#[from] ServerError),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be parsed or has invalid values
    #[error("Invalid config in {}: {message}\n\nHint: Check archaeopteryx.json syntax and field types", .path.display())]
    InvalidFile {
        /// Config file being loaded
        path: PathBuf,
        /// Figment extraction error
        message: String,
    },

    /// Settings from flags or environment are invalid
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// An interceptor name has no registered interceptor
    #[error("Unknown interceptor '{name}'\n\nHint: Available interceptors: {available}")]
    UnknownInterceptor {
        /// Requested name
        name: String,
        /// Comma-separated registered names
        available: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                CliError::Io(io_err) => {
                    CliError::Custom(format!("{}: {}", path.as_ref().display(), io_err))
                }
                other => other,
            }
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
