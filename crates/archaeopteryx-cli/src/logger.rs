//! Logging setup for the archaeopteryx CLI.
//!
//! Level selection, in order:
//! 1. `--debug`: debug for both archaeopteryx crates
//! 2. `--silent`: nothing at all
//! 3. `RUST_LOG`, when set
//! 4. info for archaeopteryx

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEBUG_FILTER: &str = "archaeopteryx=debug,archaeopteryx_cli=debug";
const DEFAULT_FILTER: &str = "archaeopteryx=info,archaeopteryx_cli=info";

/// Initialize the tracing subscriber. Call once, before any logging.
pub fn init_logger(debug: bool, silent: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .compact();

    tracing_subscriber::registry()
        .with(filter(debug, silent))
        .with(fmt_layer)
        .init();
}

fn filter(debug: bool, silent: bool) -> EnvFilter {
    if debug {
        EnvFilter::new(DEBUG_FILTER)
    } else if silent {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Whether ANSI colors should be used.
///
/// `NO_COLOR` disables, `FORCE_COLOR` enables, otherwise ask the terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    console::Term::stderr().features().colors_supported()
}
