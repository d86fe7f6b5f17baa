//! Logging utilities for exec-team-core.
//!
//! Re-exports tracing macros with log_* naming convention for consistency,
//! and a one-shot subscriber initializer for binaries embedding this crate.

#[allow(unused_imports)]
pub use tracing::{
    debug as log_debug, error as log_error, info as log_info, trace as log_trace, warn as log_warn,
};

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing_subscriber::fmt` layer driven by `RUST_LOG`
/// (default `info`). Safe to call more than once; only the first call
/// takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    });
}
