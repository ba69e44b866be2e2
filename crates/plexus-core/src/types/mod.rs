//! Canonical gateway types

mod function;
mod message;
mod provider;
mod request;
mod response;
mod stream;
mod target;

pub use function::GatewayFunction;
pub use message::{
    ChatMessage, ContentPart, FunctionCall, FunctionDefinition, ImageUrl, MessageContent, Role, ToolCall,
    ToolDefinition,
};
pub use provider::ProviderId;
pub use request::{
    ChatCompletionRequest, CompletionRequest, EmbeddingRequest, ImageGenerationRequest, RequestPayload,
    ResponsesRequest,
};
pub use response::{
    CanonicalResponse, ChatCompletionResponse, Choice, ChoiceMessage, EmbeddingData, EmbeddingResponse, FinishReason,
    ImageData, ImageGenerationResponse, TextChoice, TextCompletionResponse, Usage,
};
pub use stream::{
    DONE_CHUNK, DONE_SENTINEL, StreamFormat, StreamParsePolicy, StreamState, sse_data, strip_sse_prefix,
};
pub use target::{DEFAULT_RETRY_STATUSES, MAX_RETRY_ATTEMPTS, RetryPolicy, Target};
