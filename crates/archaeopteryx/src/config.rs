//! Server configuration.
//!
//! [`ServerConfig`] is built once at startup (usually by the CLI, from flags
//! merged with `archaeopteryx.json`) and handed to [`crate::Server`]. It is
//! read-only while serving.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional config file looked up in the served root.
pub const CONFIG_FILE_NAME: &str = "archaeopteryx.json";

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Directory being served
    pub root: PathBuf,

    /// TCP port, 1-65535
    pub port: u16,

    /// Interface to bind
    pub hostname: String,

    /// Suppress all request and error output
    pub silent: bool,

    /// Print full error detail instead of short messages
    pub debug: bool,

    /// Disable the websocket live-reload channel and script injection
    #[serde(alias = "noReload")]
    pub disable_reload: bool,

    /// Serve over HTTPS
    pub secure: bool,

    /// Send `Access-Control-Allow-Origin: *`
    pub cors: bool,

    /// Hide directories (404) instead of listing them
    #[serde(alias = "filesOnly")]
    pub dont_list: bool,

    /// Retry missing paths as absolute filesystem paths
    pub allow_absolute: bool,

    /// TLS certificate, relative to `root` unless absolute
    pub cert_file: PathBuf,

    /// TLS private key, relative to `root` unless absolute
    pub key_file: PathBuf,

    /// SPA entry point served for `GET /`
    #[serde(alias = "entry")]
    pub entry_point: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            port: 8080,
            hostname: "0.0.0.0".to_string(),
            silent: false,
            debug: false,
            disable_reload: false,
            secure: false,
            cors: false,
            dont_list: false,
            allow_absolute: false,
            cert_file: PathBuf::from("archaeopteryx.crt"),
            key_file: PathBuf::from("archaeopteryx.key"),
            entry_point: "index.html".to_string(),
        }
    }
}

impl ServerConfig {
    /// Config rooted at `root` with every other setting at its default.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Whether the live-reload websocket and script injection are active.
    pub fn live_reload(&self) -> bool {
        !self.disable_reload
    }

    /// Whether directories are rendered as listings.
    pub fn listings_enabled(&self) -> bool {
        !self.dont_list
    }

    /// Full path of the SPA entry point.
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry_point)
    }

    /// Certificate path, resolved against `root` when relative.
    pub fn cert_path(&self) -> PathBuf {
        resolve_against(&self.root, &self.cert_file)
    }

    /// Private key path, resolved against `root` when relative.
    pub fn key_path(&self) -> PathBuf {
        resolve_against(&self.root, &self.key_file)
    }

    /// `hostname:port` string used for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Path of the optional config file inside `root`.
    pub fn config_file_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Validate settings that must hold before the server starts.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidPort`] for port 0
    /// - [`ConfigError::EmptyEntryPoint`] for an empty entry point
    /// - [`ConfigError::RootNotFound`] when `root` is not a directory
    /// - [`ConfigError::MissingCredentials`] when `secure` is set and the
    ///   certificate or key is missing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.entry_point.trim().is_empty() {
            return Err(ConfigError::EmptyEntryPoint);
        }

        if !self.root.is_dir() {
            return Err(ConfigError::RootNotFound(self.root.clone()));
        }

        if self.secure {
            let missing: Vec<PathBuf> = [self.cert_path(), self.key_path()]
                .into_iter()
                .filter(|p| !p.exists())
                .collect();

            if !missing.is_empty() {
                return Err(ConfigError::MissingCredentials { missing });
            }
        }

        Ok(())
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
