//! Gateway dispatcher and HTTP surface for Plexus
//!
//! Hosts the `OpenAI`-compatible endpoints, resolves per-request routing
//! from the `x-plexus-config` header, and drives requests through the
//! provider adapter core with retries, streaming, and request logging.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod dispatch;
pub mod router;
pub mod state;

pub use dispatch::{DispatchOutcome, dispatch};
pub use router::{ROUTE_HEADER, gateway_router};
pub use state::GatewayState;
