use serde::{Deserialize, Serialize};

/// Logical operation performed by the gateway, independent of provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GatewayFunction {
    /// Chat completion (`OpenAI` Chat Completions surface)
    ChatComplete,
    /// Legacy text completion
    Complete,
    /// Embedding generation
    Embed,
    /// `OpenAI` Responses API
    Responses,
    /// Image generation
    ImageGenerate,
    /// Pass-through of an arbitrary provider path
    Proxy,
}

impl GatewayFunction {
    /// All functions the gateway can dispatch
    pub const ALL: [Self; 6] = [
        Self::ChatComplete,
        Self::Complete,
        Self::Embed,
        Self::Responses,
        Self::ImageGenerate,
        Self::Proxy,
    ];

    /// The `object` tag canonical success responses carry for this function
    pub const fn object_tag(self) -> &'static str {
        match self {
            Self::ChatComplete => "chat.completion",
            Self::Complete => "text_completion",
            Self::Embed => "list",
            Self::Responses => "response",
            Self::ImageGenerate => "image.generation",
            Self::Proxy => "proxy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_round_trip() {
        let json = serde_json::to_string(&GatewayFunction::ChatComplete).unwrap();
        assert_eq!(json, "\"chat-complete\"");
        assert_eq!(GatewayFunction::ChatComplete.to_string(), "chat-complete");
        assert_eq!("image-generate".parse::<GatewayFunction>().unwrap(), GatewayFunction::ImageGenerate);
    }
}
