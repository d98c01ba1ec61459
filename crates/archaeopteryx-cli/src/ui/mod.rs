//! Terminal output: status messages and the start banner.
//!
//! ```no_run
//! use archaeopteryx_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Listening");
//! ui::warning("Could not resolve network address");
//! ```

mod banner;
mod messages;

pub use banner::{network_addresses, print_start, server_url};
pub use messages::{info, success, warning};

use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Decide once whether messages are colored.
pub fn init_colors(no_color: bool) {
    COLORS.store(
        !no_color && crate::logger::should_use_colors(),
        Ordering::Relaxed,
    );
}

pub(crate) fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}
