pub mod gemini_adapter;
pub mod generator;
pub mod rotation;
pub mod types;

pub use gemini_adapter::{GeminiAdapter, GeminiConfig};
pub use generator::{
    parse_proto_tasks, response_schema, LlmTaskGenerator, MockTaskGenerator, TaskGenerator,
    SYSTEM_INSTRUCTION,
};
pub use rotation::Rotator;
pub use types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError};
