use http::header::HeaderName;
use plexus_config::CorsConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build a CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let mut layer = CorsLayer::new().allow_methods(Any);

    layer = if config.allow_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins = config
            .allow_origins
            .iter()
            .map(|o| o.parse())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("invalid CORS origin: {e}"))?;
        layer.allow_origin(AllowOrigin::list(origins))
    };

    layer = if config.allow_headers.is_empty() {
        layer.allow_headers(Any)
    } else {
        let headers = config
            .allow_headers
            .iter()
            .map(|h| h.parse::<HeaderName>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("invalid CORS header name: {e}"))?;
        layer.allow_headers(headers)
    };

    Ok(layer)
}
