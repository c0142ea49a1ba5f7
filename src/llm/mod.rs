pub mod gemini;
pub mod provider;
pub mod types;

pub use gemini::GeminiProvider;
pub use provider::LlmProvider;
pub use provider::LlmProvider as ChatModel;
pub use types::{
    ChatResponse, Message, Role, StopReason, ToolCall, ToolDefinition, ToolInputSchema, Usage,
};
