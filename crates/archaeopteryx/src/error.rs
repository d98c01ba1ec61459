//! Error types for the server core.
//!
//! The hierarchy mirrors how each failure is handled:
//! - [`ConfigError`] is fatal at startup
//! - [`DispatchError`] is scoped to one request; not-found flavours are
//!   recovered with the 404 page, the rest abandon the request
//! - [`ServerError`] ends [`crate::Server::run`]
//!
//! Recovered errors go through [`report_error`], which honours the `silent`
//! and `debug` settings.

use crate::config::ServerConfig;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by caller-supplied interceptors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias using [`ServerError`] as the default error type.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Top-level server error.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration detected at startup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Certificate or key could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),

    /// I/O errors from the listener
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The before interceptors turned a request into something that is no
    /// longer a usable request. Terminates the whole listener.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Configuration errors, all fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port outside 1..=65535
    #[error("{0} is not a valid port.\n\nHint: Use a port between 1 and 65535")]
    InvalidPort(u16),

    /// Entry point file name is empty
    #[error("Entry point cannot be empty\n\nHint: Pass --entry <FILE> or set \"entryPoint\" in archaeopteryx.json")]
    EmptyEntryPoint,

    /// The served root does not exist or is not a directory
    #[error("Root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// `secure` is set but the certificate and/or key is missing
    #[error("Unable to find TLS credentials: {}\n\nHint: Pass --cert-file and --key-file, or place archaeopteryx.crt and archaeopteryx.key in the served root", display_paths(.missing))]
    MissingCredentials {
        /// Every credential path that does not exist
        missing: Vec<PathBuf>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("{:?}", p.display().to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-request dispatch error.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing exists at the requested path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filesystem failure while serving a path
    #[error("I/O error while serving {path}: {source}")]
    Io {
        /// Request path being served
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Websocket handshake could not be completed
    #[error("Websocket upgrade failed: {0}")]
    Upgrade(String),

    /// Live-reload watcher could not be started
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Request target is not a path (asterisk or authority form)
    #[error("Unsupported request target: {0}")]
    BadTarget(String),
}

impl DispatchError {
    /// Wrap an I/O error raised while serving `path`.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means "resource not found" and should be answered
    /// with the not-found page.
    pub fn is_not_found(&self) -> bool {
        match self {
            DispatchError::NotFound(_) => true,
            DispatchError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Report a recovered error according to the `silent` / `debug` settings.
///
/// Silent mode prints nothing. Debug mode prints the `Debug` form (full
/// detail, including the source chain); otherwise only the short message.
pub fn report_error<E>(config: &ServerConfig, err: &E)
where
    E: fmt::Debug + fmt::Display + ?Sized,
{
    if config.silent {
        return;
    }

    if config.debug {
        tracing::error!("{:?}", err);
    } else {
        tracing::error!("{}", err);
    }
}
