//! Shared test harness

pub mod mock_provider;
pub mod server;

use plexus_config::Config;

/// Config with no defaults: routing comes entirely from request headers
pub fn empty_config() -> Config {
    Config::default()
}
