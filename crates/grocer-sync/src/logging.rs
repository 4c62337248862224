//! Tracing subscriber setup for binaries and tests embedding the adapter.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=grocer_sync=trace` - Show trace for the sync crate only
//! - Default: `info,grocer=debug`

use tracing_subscriber::EnvFilter;

use crate::error::{SyncError, SyncResult};

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_LOG_FILTER: &str = "info,grocer=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global fmt subscriber.
///
/// Panics if a global subscriber is already set; use [`try_init_tracing`]
/// where that can happen (tests, embedding apps).
pub fn init_tracing() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Installs the global fmt subscriber unless one is already set.
pub fn try_init_tracing() -> SyncResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .map_err(|e| SyncError::Internal(format!("tracing already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_twice_reports_error() {
        // The first call may lose the race with another test; the second
        // one must fail either way.
        let _ = try_init_tracing();
        assert!(matches!(try_init_tracing(), Err(SyncError::Internal(_))));
    }
}
