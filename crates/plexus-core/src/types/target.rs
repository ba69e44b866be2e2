use secrecy::SecretString;
use serde::Deserialize;

use super::provider::ProviderId;

/// Default status codes eligible for retry
pub const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Hard cap on per-target retry attempts
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Per-target retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the first (capped at [`MAX_RETRY_ATTEMPTS`])
    pub attempts: u32,
    /// Upstream status codes that qualify for a retry
    #[serde(default = "default_retry_statuses")]
    pub on_status: Vec<u16>,
}

fn default_retry_statuses() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            on_status: default_retry_statuses(),
        }
    }
}

impl RetryPolicy {
    /// Attempts after clamping to the hard cap
    pub fn effective_attempts(&self) -> u32 {
        self.attempts.clamp(1, MAX_RETRY_ATTEMPTS)
    }

    /// Whether the given upstream status qualifies for a retry
    pub fn retries_status(&self, status: u16) -> bool {
        self.on_status.contains(&status)
    }
}

/// One concrete provider selection a request may be dispatched to
///
/// Immutable once resolved for a single request attempt.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Provider to dispatch to
    pub provider: ProviderId,
    /// API key for the provider (absent for keyless local providers)
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Caller-supplied host override (validated before use)
    #[serde(default)]
    pub custom_host: Option<String>,
    /// Organization header value (`OpenAI`)
    #[serde(default)]
    pub organization: Option<String>,
    /// API version (azure-openai)
    #[serde(default)]
    pub api_version: Option<String>,
    /// Deployment name (azure-openai)
    #[serde(default)]
    pub deployment: Option<String>,
    /// Relative weight for weighted selection
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Retry policy for this target
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// Strip provider-specific response extras down to the strict `OpenAI`
    /// schema
    #[serde(default)]
    pub strict_openai_compliance: bool,
}

const fn default_weight() -> u32 {
    1
}

impl Target {
    /// Minimal target for a provider, used by defaults and tests
    pub fn for_provider(provider: ProviderId) -> Self {
        Self {
            provider,
            api_key: None,
            custom_host: None,
            organization: None,
            api_version: None,
            deployment: None,
            weight: 1,
            retry: None,
            strict_openai_compliance: false,
        }
    }

    /// Redacted JSON representation, safe to attach to request logs
    ///
    /// The API key is replaced by a fixed marker; all other fields are
    /// configuration, not secrets.
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("provider".to_owned(), serde_json::json!(self.provider));
        if self.api_key.is_some() {
            obj.insert("api_key".to_owned(), serde_json::json!("[redacted]"));
        }
        if let Some(host) = &self.custom_host {
            obj.insert("custom_host".to_owned(), serde_json::json!(host));
        }
        if let Some(org) = &self.organization {
            obj.insert("organization".to_owned(), serde_json::json!(org));
        }
        if let Some(version) = &self.api_version {
            obj.insert("api_version".to_owned(), serde_json::json!(version));
        }
        if let Some(deployment) = &self.deployment {
            obj.insert("deployment".to_owned(), serde_json::json!(deployment));
        }
        obj.insert("weight".to_owned(), serde_json::json!(self.weight));
        obj.insert(
            "strict_openai_compliance".to_owned(),
            serde_json::json!(self.strict_openai_compliance),
        );
        serde_json::Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_hides_api_key() {
        let target: Target = serde_json::from_value(serde_json::json!({
            "provider": "openai",
            "api_key": "sk-super-secret"
        }))
        .unwrap();
        let redacted = target.redacted_json();
        assert_eq!(redacted["api_key"], "[redacted]");
        assert!(!redacted.to_string().contains("sk-super-secret"));
    }

    #[test]
    fn retry_attempts_are_capped() {
        let policy = RetryPolicy {
            attempts: 99,
            on_status: vec![429],
        };
        assert_eq!(policy.effective_attempts(), MAX_RETRY_ATTEMPTS);
        assert!(policy.retries_status(429));
        assert!(!policy.retries_status(500));
    }

    #[test]
    fn unknown_target_fields_are_rejected() {
        let result: Result<Target, _> = serde_json::from_value(serde_json::json!({
            "provider": "openai",
            "nonsense": true
        }));
        assert!(result.is_err());
    }
}
