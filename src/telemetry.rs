//! Telemetry setup for the CLI
//!
//! Installs a `tracing` subscriber writing to stderr so command output on
//! stdout stays clean. The filter defaults to crate-level info and is
//! overridable through `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
pub fn init_tracing_subscriber() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recall=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
