//! Tracing setup for hosts embedding apimate.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable holding a filter directive, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "APIMATE_LOG";

/// Filter from `APIMATE_LOG`, then `RUST_LOG`, then `default_directive`.
/// Unparseable directives fall through to the next source.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}

/// Install a stderr subscriber. Returns `false` when one was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let init_result = tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt_layer)
        .try_init();

    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping apimate tracing setup");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialisation_is_skipped() {
        init_tracing("apimate=debug");
        assert!(!init_tracing("apimate=debug"));
    }
}
