//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use archaeopteryx::ServerError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Server(ServerError::Bind { addr, source }) => miette::miette!(
            "Failed to bind to {}: {}\n\nHint: Is another server running? Pick a different --port",
            addr,
            source
        ),
        CliError::Server(ServerError::ProtocolViolation(reason)) => {
            miette::miette!("Server stopped after a protocol violation: {}", reason)
        }
        _ => miette::miette!("{}", err),
    }
}
