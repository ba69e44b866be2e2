//! Configuration for Plexus
//!
//! A TOML file configures the server and optional named keys; per-request
//! routing arrives in the `x-plexus-config` header and is parsed by the
//! `route` module with the same validation rigor as request bodies.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod env;
pub mod gateway;
pub mod health;
mod loader;
pub mod route;
pub mod server;

use indexmap::IndexMap;
use serde::Deserialize;

pub use gateway::GatewaySettings;
pub use health::HealthConfig;
pub use route::{ResolvedRoute, RouteStrategy, parse_route_header};
pub use server::{CorsConfig, ServerConfig};

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Gateway defaults (timeout, default provider)
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Named virtual keys a route header can reference instead of carrying
    /// a raw secret
    #[serde(default)]
    pub keys: IndexMap<String, route::TargetConfig>,
}
