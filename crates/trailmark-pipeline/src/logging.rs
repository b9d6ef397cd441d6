//! Debug-mode logging
//!
//! The pipeline logs through `tracing` everywhere. Nothing is printed
//! unless a subscriber is installed; [`init`] installs one for debug mode.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "trailmark=debug"
    } else {
        "off"
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG` or the debug default.
///
/// Returns false when a global subscriber was already installed; the
/// existing one is left in place.
pub fn init(debug: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
