use serde_json::Value;

use crate::types::{GatewayFunction, Target};

/// Request context handed to API descriptors and transformers
///
/// A borrowed view over one dispatch attempt: the resolved target, the
/// function being performed, and the canonical body as JSON. Pure inputs;
/// descriptors and transformers must not stash state here.
#[derive(Debug, Clone, Copy)]
pub struct ApiContext<'a> {
    /// Resolved routing target for this attempt
    pub target: &'a Target,
    /// Gateway function being performed
    pub function: GatewayFunction,
    /// Canonical request body as JSON
    pub body: &'a Value,
    /// Forwarded path for the proxy function, e.g. `/api/chat`
    pub forwarded_path: Option<&'a str>,
}

impl<'a> ApiContext<'a> {
    /// Build a context for a non-proxy function
    pub const fn new(target: &'a Target, function: GatewayFunction, body: &'a Value) -> Self {
        Self {
            target,
            function,
            body,
            forwarded_path: None,
        }
    }

    /// Requested model from the canonical body, when present
    pub fn model(&self) -> Option<&str> {
        self.body.get("model").and_then(Value::as_str)
    }

    /// Whether the caller asked for strict `OpenAI` schema compliance
    pub const fn strict(&self) -> bool {
        self.target.strict_openai_compliance
    }
}
