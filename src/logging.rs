//! Process-wide tracing setup.
//!
//! Diagnostics go to stderr; the per-run journal under `.agent_runs/` is the
//! product output and is unaffected by the log filter. `RUST_LOG` overrides
//! the default level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber.
///
/// Defaults to `info`; `verbose` lowers the default to `debug`. Safe to call
/// once per process, from `main`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
