//! Archaeopteryx - static dev server with SPA routing and live reload.

use archaeopteryx_cli::{cli, commands, config::AppConfig, error, logger, ui};
use clap::Parser;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // The config file may change silent/debug, so load it before logging
    let config = AppConfig::load(&args).map_err(error::cli_error_to_miette)?;

    logger::init_logger(config.server.debug, config.server.silent, args.no_color);
    ui::init_colors(args.no_color);

    commands::serve(config)
        .await
        .map_err(error::cli_error_to_miette)
}
