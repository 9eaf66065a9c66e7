//! Diagnostics for CI logs.
//!
//! - **Tracing (this module)**: progress and warnings via `RUST_LOG`, written
//!   to stderr so they land in the workflow log.
//! - **Product output**: the posted review itself. It never goes through
//!   tracing and is unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` so skip decisions show up in the
/// workflow log without extra configuration.
///
/// # Example
/// ```bash
/// RUST_LOG=pr_review=debug pr-review run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
