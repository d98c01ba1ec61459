//! Archaeopteryx CLI.
//!
//! Wraps the [`archaeopteryx`] server core with:
//!
//! - [`cli`] - clap argument definitions
//! - [`config`] - figment layering of flags, environment and `archaeopteryx.json`
//! - [`interceptors`] - the named interceptor registry
//! - [`error`] - CLI error types and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - start banner and status messages

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod interceptors;
pub mod logger;
pub mod ui;

pub use error::{CliError, ConfigError, Result, ResultExt};
