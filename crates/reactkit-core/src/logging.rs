use tracing_subscriber::EnvFilter;

use crate::error::{CoreError, Result};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "reactkit_buttons=info,reactkit_pagination=info";

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns an error instead of panicking when a subscriber is already set, so
/// test binaries may call it from every test.
pub fn init_logging(default_filter: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.unwrap_or(DEFAULT_FILTER).into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| CoreError::Logging(e.to_string()))
}
