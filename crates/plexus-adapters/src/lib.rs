//! Provider adapter core for Plexus
//!
//! Everything needed to translate one canonical request into any supported
//! provider's native protocol and back: declarative parameter mapping
//! tables, per-provider API descriptors, response and stream-chunk
//! transformers, error normalizers, and the registry tying them together.
//! All state here is immutable after process start and shared read-only
//! across concurrent requests.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod api;
pub mod mapping;
pub mod openai_compat;
pub mod providers;
pub mod registry;

pub use adapter::ProviderAdapter;
pub use api::{ProviderApi, sniff_function, validate_custom_host};
pub use mapping::{Bounds, BoundsPolicy, FunctionTable, ParamSpec, build_request};
pub use registry::adapter;
