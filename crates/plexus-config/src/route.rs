//! Route-header parsing
//!
//! Callers steer requests with a JSON `x-plexus-config` header: a single
//! target shorthand, a virtual key reference, or a multi-target strategy.
//! The header is an external input: it is parsed once at request entry,
//! validated as strictly as the body, and only a redacted form ever reaches
//! the request log.

use plexus_core::error::GatewayError;
use plexus_core::types::{ProviderId, RetryPolicy, Target};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use crate::Config;

/// How multiple targets are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStrategy {
    /// One target only
    Single,
    /// Sequential fallback through the target list
    Fallback,
    /// Fallback ordered by descending weight
    Weighted,
}

/// One target entry as written in a header or under `[keys.*]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Provider to dispatch to
    #[serde(default)]
    pub provider: Option<ProviderId>,
    /// Virtual key reference into `[keys.*]`
    #[serde(default)]
    pub key: Option<String>,
    /// Raw API key (prefer virtual keys in shared setups)
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Host override
    #[serde(default)]
    pub custom_host: Option<String>,
    /// Organization header value
    #[serde(default)]
    pub organization: Option<String>,
    /// API version (azure-openai)
    #[serde(default)]
    pub api_version: Option<String>,
    /// Deployment name (azure-openai)
    #[serde(default)]
    pub deployment: Option<String>,
    /// Relative weight for the weighted strategy
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Retry policy for this target
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// Strict `OpenAI` schema compliance for responses
    #[serde(default)]
    pub strict_openai_compliance: Option<bool>,
}

const fn default_weight() -> u32 {
    1
}

impl TargetConfig {
    /// Resolve into a dispatchable [`Target`], merging any referenced
    /// virtual key underneath the header's own fields
    fn resolve(&self, config: &Config) -> Result<Target, GatewayError> {
        let base = match &self.key {
            Some(name) => Some(config.keys.get(name).cloned().ok_or_else(|| {
                GatewayError::Validation(format!("route header references unknown key `{name}`"))
            })?),
            None => None,
        };
        let base = base.as_ref();

        let provider = self
            .provider
            .or(base.and_then(|b| b.provider))
            .or(config.gateway.default_provider)
            .ok_or_else(|| GatewayError::Validation("route target does not name a provider".to_owned()))?;

        Ok(Target {
            provider,
            api_key: self.api_key.clone().or_else(|| base.and_then(|b| b.api_key.clone())),
            custom_host: self
                .custom_host
                .clone()
                .or_else(|| base.and_then(|b| b.custom_host.clone())),
            organization: self
                .organization
                .clone()
                .or_else(|| base.and_then(|b| b.organization.clone())),
            api_version: self
                .api_version
                .clone()
                .or_else(|| base.and_then(|b| b.api_version.clone())),
            deployment: self
                .deployment
                .clone()
                .or_else(|| base.and_then(|b| b.deployment.clone())),
            weight: self.weight,
            retry: self.retry.clone().or_else(|| base.and_then(|b| b.retry.clone())),
            strict_openai_compliance: self
                .strict_openai_compliance
                .or(base.and_then(|b| b.strict_openai_compliance))
                .unwrap_or(false),
        })
    }
}

/// Full route header shape
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteHeader {
    #[serde(default)]
    strategy: Option<RouteStrategy>,
    #[serde(default)]
    targets: Option<Vec<TargetConfig>>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    metadata: Option<Value>,
    // single-target shorthand
    #[serde(default)]
    provider: Option<ProviderId>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    api_key: Option<SecretString>,
    #[serde(default)]
    custom_host: Option<String>,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    deployment: Option<String>,
    #[serde(default)]
    retry: Option<RetryPolicy>,
    #[serde(default)]
    strict_openai_compliance: Option<bool>,
}

impl RouteHeader {
    fn shorthand_target(&self) -> TargetConfig {
        TargetConfig {
            provider: self.provider,
            key: self.key.clone(),
            api_key: self.api_key.clone(),
            custom_host: self.custom_host.clone(),
            organization: self.organization.clone(),
            api_version: self.api_version.clone(),
            deployment: self.deployment.clone(),
            weight: 1,
            retry: self.retry.clone(),
            strict_openai_compliance: self.strict_openai_compliance,
        }
    }
}

/// Resolved routing configuration for one request
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    /// Targets in attempt order
    pub targets: Vec<Target>,
    /// Attempt strategy
    pub strategy: RouteStrategy,
    /// Request deadline override
    pub timeout_secs: Option<u64>,
    /// Caller metadata labels, logged verbatim
    pub metadata: Option<Value>,
}

impl ResolvedRoute {
    /// A single-target route for the configured default provider
    pub fn default_route(config: &Config) -> Result<Self, GatewayError> {
        let provider = config.gateway.default_provider.ok_or_else(|| {
            GatewayError::Validation(
                "no x-plexus-config header and no default provider configured".to_owned(),
            )
        })?;

        // Reuse a matching virtual key when one exists
        let target = config
            .keys
            .values()
            .find(|k| k.provider == Some(provider))
            .map_or_else(
                || Ok(Target::for_provider(provider)),
                |key_config| key_config.resolve(config),
            )?;

        Ok(Self {
            targets: vec![target],
            strategy: RouteStrategy::Single,
            timeout_secs: None,
            metadata: None,
        })
    }

    /// Redacted JSON form, safe to log
    pub fn redacted_json(&self) -> Value {
        serde_json::json!({
            "strategy": match self.strategy {
                RouteStrategy::Single => "single",
                RouteStrategy::Fallback => "fallback",
                RouteStrategy::Weighted => "weighted",
            },
            "targets": self.targets.iter().map(Target::redacted_json).collect::<Vec<_>>(),
            "metadata": self.metadata,
        })
    }
}

/// Parse and resolve an `x-plexus-config` header value
pub fn parse_route_header(raw: &str, config: &Config) -> Result<ResolvedRoute, GatewayError> {
    let header: RouteHeader = serde_json::from_str(raw)
        .map_err(|e| GatewayError::Validation(format!("malformed x-plexus-config header: {e}")))?;

    let (mut targets, strategy) = match &header.targets {
        Some(list) if !list.is_empty() => {
            let targets = list
                .iter()
                .map(|t| t.resolve(config))
                .collect::<Result<Vec<_>, _>>()?;
            let strategy = header.strategy.unwrap_or(if targets.len() > 1 {
                RouteStrategy::Fallback
            } else {
                RouteStrategy::Single
            });
            (targets, strategy)
        }
        Some(_) => {
            return Err(GatewayError::Validation("route header has an empty targets list".to_owned()));
        }
        None => {
            let target = header.shorthand_target().resolve(config)?;
            (vec![target], header.strategy.unwrap_or(RouteStrategy::Single))
        }
    };

    if strategy == RouteStrategy::Weighted {
        // Deterministic weighted priority: heavier targets first
        targets.sort_by(|a, b| b.weight.cmp(&a.weight));
    }

    Ok(ResolvedRoute {
        targets,
        strategy,
        timeout_secs: header.request_timeout_secs,
        metadata: header.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> Config {
        let toml = r#"
            [gateway]
            default_provider = "openai"

            [keys.prod-openai]
            provider = "openai"
            api_key = "sk-prod"
            organization = "org-7"
        "#;
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn single_target_shorthand_parses() {
        let route = parse_route_header(r#"{"provider": "groq", "api_key": "gsk-1"}"#, &Config::default()).unwrap();
        assert_eq!(route.targets.len(), 1);
        assert_eq!(route.targets[0].provider, ProviderId::Groq);
        assert_eq!(route.strategy, RouteStrategy::Single);
    }

    #[test]
    fn virtual_key_reference_merges_under_header_fields() {
        let config = config_with_key();
        let route = parse_route_header(r#"{"key": "prod-openai", "organization": "org-override"}"#, &config).unwrap();
        let target = &route.targets[0];
        assert_eq!(target.provider, ProviderId::Openai);
        assert!(target.api_key.is_some());
        assert_eq!(target.organization.as_deref(), Some("org-override"));
    }

    #[test]
    fn unknown_key_reference_is_a_validation_error() {
        let err = parse_route_header(r#"{"key": "nope"}"#, &config_with_key()).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn fallback_targets_keep_order() {
        let raw = r#"{
            "strategy": "fallback",
            "targets": [
                {"provider": "openai", "api_key": "sk-1"},
                {"provider": "groq", "api_key": "gsk-2"}
            ]
        }"#;
        let route = parse_route_header(raw, &Config::default()).unwrap();
        assert_eq!(route.strategy, RouteStrategy::Fallback);
        assert_eq!(route.targets[0].provider, ProviderId::Openai);
        assert_eq!(route.targets[1].provider, ProviderId::Groq);
    }

    #[test]
    fn weighted_targets_sort_by_weight() {
        let raw = r#"{
            "strategy": "weighted",
            "targets": [
                {"provider": "groq", "api_key": "a", "weight": 1},
                {"provider": "openai", "api_key": "b", "weight": 5}
            ]
        }"#;
        let route = parse_route_header(raw, &Config::default()).unwrap();
        assert_eq!(route.targets[0].provider, ProviderId::Openai);
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = parse_route_header("{not json", &Config::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_route_header(r#"{"provider": "openai", "surprise": 1}"#, &Config::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn redaction_never_exposes_secrets() {
        let route =
            parse_route_header(r#"{"provider": "openai", "api_key": "sk-super-secret"}"#, &Config::default()).unwrap();
        let redacted = route.redacted_json().to_string();
        assert!(!redacted.contains("sk-super-secret"));
        assert!(redacted.contains("[redacted]"));
    }

    #[test]
    fn default_route_uses_configured_provider_and_key() {
        let config = config_with_key();
        let route = ResolvedRoute::default_route(&config).unwrap();
        assert_eq!(route.targets[0].provider, ProviderId::Openai);
        assert!(route.targets[0].api_key.is_some());
    }

    #[test]
    fn default_route_without_configuration_fails() {
        let err = ResolvedRoute::default_route(&Config::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
