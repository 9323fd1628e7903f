//! Tracing subscriber setup

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Build the configured subscriber without installing it
///
/// `RUST_LOG` wins over `config.level`.
pub fn build_dispatch(config: &LoggingConfig) -> Result<Dispatch> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let dispatch = match config.format {
        LogFormat::Pretty => {
            Dispatch::new(registry.with(tracing_subscriber::fmt::layer().with_target(true)))
        }
        LogFormat::Json => Dispatch::new(
            registry.with(tracing_subscriber::fmt::layer().json().with_current_span(true)),
        ),
    };
    Ok(dispatch)
}

/// Install a global subscriber
///
/// Returns an error if a global subscriber is already set, which callers
/// (tests, embedding hosts) are free to ignore.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let dispatch = build_dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch)
        .map_err(|e| Error::other(format!("Tracing already initialised: {}", e)))
}
