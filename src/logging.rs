// src/logging.rs

use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber. Identical for both binaries:
/// stdout only, no target module noise, `RUST_LOG`-driven filter defaulting
/// to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stdout)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
