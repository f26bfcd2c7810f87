//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`
///
/// Without `RUST_LOG`, linecov logs at `debug` when `verbose` and at `warn`
/// otherwise. Returns `false` when a global subscriber already exists.
pub fn init_tracing(verbose: bool) -> bool {
    let default = if verbose { "linecov=debug" } else { "linecov=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
