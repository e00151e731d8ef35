//! Diagnostic tracing for the cycle engine.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`. The run
//! report and progress lines are product output on stdout and are never
//! affected by the log filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, or `debug` when `debug`
/// is requested on the command line.
///
/// # Example
/// ```bash
/// RUST_LOG=testwang=debug testwang flaky.txt -N 5
/// ```
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
