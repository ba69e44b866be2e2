//! Provider API descriptors: base URL, endpoint, and header computation
//!
//! Descriptors are pure functions of the request context. Self-hostable
//! providers accept a caller-supplied host, which is validated here before
//! any request leaves the gateway.

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use plexus_core::context::ApiContext;
use plexus_core::error::GatewayError;
use plexus_core::types::GatewayFunction;
use secrecy::ExposeSecret;
use url::Url;

/// Per-provider endpoint and header computation
pub trait ProviderApi: Send + Sync {
    /// Provider origin for this request
    ///
    /// Implementations for self-hostable providers must run any
    /// caller-supplied host through [`validate_custom_host`]; an explicit
    /// invalid host is an error, never a silent fallback to the default.
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError>;

    /// URL path for `(provider, function)`
    ///
    /// An empty path means the function is unsupported by this provider.
    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError>;

    /// Auth and content headers for the outbound call
    ///
    /// When [`Self::api_key_required`] is false and no key was supplied the
    /// auth header is omitted entirely, not sent empty.
    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError>;

    /// Whether the provider refuses unauthenticated requests
    fn api_key_required(&self) -> bool {
        true
    }
}

/// Validate a caller-supplied host override
///
/// Accepts http/https URLs with a non-empty hostname and no `..` path
/// segments; query and fragment are stripped. Returns the normalized origin
/// plus path with no trailing slash.
pub fn validate_custom_host(raw: &str) -> Result<String, GatewayError> {
    // Checked on the raw text: Url::parse would silently normalize `..`
    // segments away
    if raw.contains("..") {
        return Err(GatewayError::InvalidHostConfiguration(
            "host must not contain traversal segments".to_owned(),
        ));
    }

    let mut url =
        Url::parse(raw).map_err(|e| GatewayError::InvalidHostConfiguration(format!("`{raw}` is not a URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(GatewayError::InvalidHostConfiguration(format!(
                "unsupported scheme `{other}`, only http and https are allowed"
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(GatewayError::InvalidHostConfiguration(
            "host must include a hostname".to_owned(),
        ));
    }

    url.set_query(None);
    url.set_fragment(None);

    Ok(url.as_str().trim_end_matches('/').to_owned())
}

/// Resolve the effective base URL: validated custom host, else the default
pub fn base_url_or_default(ctx: &ApiContext<'_>, default: &str) -> Result<String, GatewayError> {
    match ctx.target.custom_host.as_deref() {
        Some(host) => validate_custom_host(host),
        None => Ok(default.to_owned()),
    }
}

/// Re-derive the canonical function from a forwarded proxy path
///
/// Best-effort over known provider path shapes. Unknown paths return `None`
/// so the caller reports "unsupported" instead of guessing.
pub fn sniff_function(path: &str) -> Option<GatewayFunction> {
    let path = path.trim_end_matches('/');
    if path.ends_with("/chat/completions") || path.ends_with("/api/chat") {
        Some(GatewayFunction::ChatComplete)
    } else if path.ends_with("/api/generate") || path.ends_with("/completions") {
        Some(GatewayFunction::Complete)
    } else if path.ends_with("/embeddings") || path.ends_with("/api/embed") {
        Some(GatewayFunction::Embed)
    } else if path.ends_with("/images/generations") {
        Some(GatewayFunction::ImageGenerate)
    } else if path.ends_with("/responses") {
        Some(GatewayFunction::Responses)
    } else {
        None
    }
}

/// Endpoint for the proxy function: the forwarded path when it maps to a
/// known canonical function, else the explicit unsupported empty path
pub fn proxy_endpoint(ctx: &ApiContext<'_>) -> String {
    ctx.forwarded_path
        .filter(|path| sniff_function(path).is_some())
        .unwrap_or("")
        .to_owned()
}

/// Insert a header, mapping invalid names/values to an internal error
pub fn put_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), GatewayError> {
    let name = HeaderName::from_static(name);
    let value =
        HeaderValue::from_str(value).map_err(|_| GatewayError::Internal(format!("invalid value for header {name}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Standard JSON content-type plus `Authorization: Bearer` headers
///
/// The auth header is omitted when no key is available; providers that
/// require a key surface that before dispatch via [`require_api_key`].
pub fn bearer_headers(ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    put_header(&mut headers, "content-type", "application/json")?;
    if let Some(key) = &ctx.target.api_key {
        put_header(&mut headers, "authorization", &format!("Bearer {}", key.expose_secret()))?;
    }
    Ok(headers)
}

/// Fail fast when a key-requiring provider has no key configured
pub fn require_api_key(ctx: &ApiContext<'_>) -> Result<(), GatewayError> {
    if ctx.target.api_key.is_none() {
        return Err(GatewayError::Validation(format!(
            "provider {} requires an api_key and none was supplied",
            ctx.target.provider
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let err = validate_custom_host("javascript:alert(1)").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidHostConfiguration(_)));

        let err = validate_custom_host("file:///etc/passwd").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidHostConfiguration(_)));
    }

    #[test]
    fn rejects_empty_hostname() {
        assert!(validate_custom_host("http://").is_err());
    }

    #[test]
    fn rejects_path_traversal() {
        let err = validate_custom_host("http://internal/../admin").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidHostConfiguration(_)));
    }

    #[test]
    fn strips_query_and_fragment() {
        let host = validate_custom_host("https://inference.example.com/v1?debug=1#frag").unwrap();
        assert_eq!(host, "https://inference.example.com/v1");
    }

    #[test]
    fn accepts_plain_origin() {
        let host = validate_custom_host("http://localhost:11434").unwrap();
        assert_eq!(host, "http://localhost:11434");
    }

    #[test]
    fn sniffs_known_paths() {
        assert_eq!(sniff_function("/api/chat"), Some(GatewayFunction::ChatComplete));
        assert_eq!(sniff_function("/v1/chat/completions"), Some(GatewayFunction::ChatComplete));
        assert_eq!(sniff_function("/v1/completions"), Some(GatewayFunction::Complete));
        assert_eq!(sniff_function("/api/embed"), Some(GatewayFunction::Embed));
        assert_eq!(sniff_function("/v1/embeddings"), Some(GatewayFunction::Embed));
        assert_eq!(sniff_function("/v1/images/generations"), Some(GatewayFunction::ImageGenerate));
        assert_eq!(sniff_function("/v1/responses"), Some(GatewayFunction::Responses));
    }

    #[test]
    fn unknown_paths_are_not_guessed() {
        assert_eq!(sniff_function("/v1/fine_tuning/jobs"), None);
        assert_eq!(sniff_function("/"), None);
    }
}
