use std::path::PathBuf;

use clap::Parser;

/// Plexus AI Gateway
#[derive(Debug, Parser)]
#[command(name = "plexus", about = "Unified OpenAI-compatible gateway for AI providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "plexus.toml", env = "PLEXUS_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "PLEXUS_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,

    /// Emit logs as JSON
    #[arg(long, env = "PLEXUS_LOG_JSON")]
    pub log_json: bool,
}
