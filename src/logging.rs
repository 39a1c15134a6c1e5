//! Tracing setup shared by the CLI binary and the dev visualization tool.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` fmt layer honoring `RUST_LOG`, defaulting
/// to `info` when unset. Safe to call more than once; subsequent calls are
/// no-ops once a global subscriber is set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
