//! Development-time tracing for the orchestrator.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG`, output to stderr.
//!   Session lifecycle, variable traffic, and disposal failures are reported
//!   here.
//!
//! - **Reports (`report`)**: Mappings and results printed to stdout by the
//!   CLI. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, so disposal
/// failures are visible without any configuration.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=simchain=debug simchain run --chain
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
