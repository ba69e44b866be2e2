use std::net::SocketAddr;

use serde::Deserialize;

use crate::health::HealthConfig;

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address (defaults to 0.0.0.0:8787)
    pub listen_address: Option<SocketAddr>,
    /// Health endpoint settings
    #[serde(default)]
    pub health: HealthConfig,
    /// CORS settings
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

/// CORS configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any
    pub allow_origins: Vec<String>,
    /// Allowed request headers
    #[serde(default)]
    pub allow_headers: Vec<String>,
}
