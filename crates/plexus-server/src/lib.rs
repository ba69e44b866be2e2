//! Server assembly for Plexus
//!
//! Builds the axum application from configuration (gateway routes, health
//! endpoint, CORS, request tracing) and runs it with graceful shutdown.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod cors;
mod health;

use std::net::SocketAddr;

use axum::Router;
use plexus_config::Config;
use plexus_gateway::GatewayState;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8787)));

        let health = config.server.health.enabled.then(|| config.server.health.path.clone());
        let cors = config.server.cors.as_ref().map(cors::cors_layer).transpose()?;

        let state = GatewayState::new(config);
        let mut app = plexus_gateway::gateway_router(state);

        if let Some(path) = health {
            app = app.route(&path, axum::routing::get(health::health_handler));
        }

        app = app.layer(TraceLayer::new_for_http());

        if let Some(cors) = cors {
            app = app.layer(cors);
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Consume the server, returning the router (used by test harnesses)
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Bind and serve until the cancellation token fires
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        tracing::info!(address = %self.listen_address, "plexus listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await?;

        Ok(())
    }
}
