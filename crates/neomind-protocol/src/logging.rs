//! Tracing subscriber setup for hosts embedding protocol adapters.

use tracing_subscriber::EnvFilter;

use crate::config::env_vars;

/// Filter used when neither `RUST_LOG` nor `NEOMIND_LOG` is set.
///
/// Only `neomind` targets are raised to the requested level; dependencies
/// stay at their own defaults.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    format!("neomind={}", level).to_lowercase()
}

/// Install a global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `NEOMIND_LOG` and then
/// [`default_filter`]. Set `NEOMIND_LOG_JSON=true` for JSON output. Calling
/// this more than once is harmless; later calls leave the first subscriber
/// in place.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        env_vars::log_filter()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(default_filter(verbose)))
    });

    let result = if env_vars::log_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
