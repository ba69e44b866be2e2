use plexus_core::types::ProviderId;
use serde::Deserialize;

/// Gateway-level defaults applied when a route header omits them
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySettings {
    /// Outbound request deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Provider used when a request carries no route header
    #[serde(default)]
    pub default_provider: Option<ProviderId>,
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            default_provider: None,
        }
    }
}
