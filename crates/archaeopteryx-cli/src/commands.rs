//! The serve command.

use crate::config::AppConfig;
use crate::error::{Result, ResultExt};
use crate::interceptors::InterceptorRegistry;
use crate::ui;
use archaeopteryx::Server;

/// Start the server and run until Ctrl+C or a fatal error.
///
/// # Errors
///
/// Returns error if an interceptor name is unknown, the server cannot start,
/// or the listener stops on a protocol violation.
pub async fn serve(config: AppConfig) -> Result<()> {
    let registry = InterceptorRegistry::with_builtins();
    let interceptors = registry.resolve(&config.before, &config.after)?;

    let server = Server::bind(config.server, interceptors).await?;
    let addr = server.local_addr()?;
    let silent = server.config().silent;

    if !silent {
        ui::print_start(server.config(), addr);
    }

    tokio::select! {
        result = server.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            if !silent {
                ui::info("Shutting down");
            }
        }
    }

    Ok(())
}
