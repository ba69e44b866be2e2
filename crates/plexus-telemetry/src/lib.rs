//! Telemetry for Plexus
//!
//! Structured logging via the `tracing` ecosystem: env-filtered, with
//! human-readable or JSON output.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber
///
/// `log_filter` is the default directive when `RUST_LOG` is unset; pass
/// `json` for machine-readable output.
pub fn init(log_filter: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
    }

    Ok(())
}
