use std::sync::Arc;

use plexus_config::Config;
use plexus_core::log::{LogSink, TracingLogSink};

/// Shared state for gateway route handlers
///
/// Built once at startup; everything inside is immutable or internally
/// synchronized, so cloning is cheap and handlers never contend.
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<GatewayStateInner>,
}

struct GatewayStateInner {
    config: Config,
    client: reqwest::Client,
    sink: Arc<dyn LogSink>,
}

impl GatewayState {
    /// Build state from configuration with the default tracing log sink
    pub fn new(config: Config) -> Self {
        Self::with_sink(config, Arc::new(TracingLogSink))
    }

    /// Build state with a custom log sink (the storage collaborator)
    pub fn with_sink(config: Config, sink: Arc<dyn LogSink>) -> Self {
        Self {
            inner: Arc::new(GatewayStateInner {
                config,
                client: reqwest::Client::new(),
                sink,
            }),
        }
    }

    /// Gateway configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Shared outbound HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// Log sink collaborator
    pub fn sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.inner.sink)
    }
}
