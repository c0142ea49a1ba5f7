//! Conversation types shared by the turn processor, the session store and
//! the chat-completion providers
//!
//! Providers translate these types to their own wire format at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Messages
// ============================================================================

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// Operator utterance
    User,
    /// Model reply
    Assistant,
    /// Result of a tool call
    Tool,
}

impl Role {
    /// Lowercase role name as stored on disk
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured request from the model to run a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier used to pair the call with its result
    pub id: String,
    /// Name of the tool to run
    pub name: String,
    /// Arguments keyed by parameter name
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Opaque signature Gemini attaches to a function call; sent back
    /// unchanged when the call is replayed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl ToolCall {
    /// Create a tool call with a fresh id
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
            thought_signature: None,
        }
    }

    /// Create a tool call with an explicit id
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            thought_signature: None,
        }
    }

    /// Arguments as a JSON object value
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Text content (may be empty for an assistant message that only calls a tool)
    #[serde(default)]
    pub content: String,

    /// Tool call requested by an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,

    /// For tool messages: id of the call this result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// For tool messages: name of the tool that produced the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// For tool messages: whether the tool reported an error
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
            tool_name: None,
            is_error: false,
        }
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    /// Create an assistant message that requests a tool
    pub fn assistant_with_tool_call(text: impl Into<String>, call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::plain(Role::Assistant, text)
        }
    }

    /// Create a tool result message answering `call`
    pub fn tool_result(call: &ToolCall, output: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            is_error,
            ..Self::plain(Role::Tool, output)
        }
    }

    /// Check if this message requests a tool
    pub fn has_tool_call(&self) -> bool {
        self.tool_call.is_some()
    }
}

// ============================================================================
// Tool definitions
// ============================================================================

/// JSON schema for tool input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,

    /// Required property names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolInputSchema {
    /// Object schema with the given properties and required names
    pub fn object(properties: Value, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: Some(required.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// Tool declaration sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// Input schema
    pub input_schema: ToolInputSchema,
}

// ============================================================================
// Responses
// ============================================================================

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the reply
    EndTurn,
    /// Reply requests tool use
    ToolUse,
    /// Output token limit reached
    MaxTokens,
    /// Blocked by safety filters
    Refusal,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
}

/// One chat-completion result
///
/// Providers report every function call they receive; the turn processor
/// decides whether the count is acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text content of the reply
    pub content: String,
    /// Tool calls requested by the reply
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Why generation stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Model that produced the reply
    #[serde(default)]
    pub model: String,
    /// Token usage
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    /// A plain text reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            stop_reason: Some(StopReason::EndTurn),
            model: String::new(),
            usage: Usage::default(),
        }
    }

    /// A reply requesting the given tool calls
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            stop_reason: Some(StopReason::ToolUse),
            model: String::new(),
            usage: Usage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serialization() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
        assert!(json.get("tool_call").is_none());
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn test_tool_result_pairs_with_call() {
        let mut args = Map::new();
        args.insert("cmd".into(), json!("ls"));
        let call = ToolCall::with_id("call_1", "run_command", args);

        let result = Message::tool_result(&call, "0", false);
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(result.tool_name.as_deref(), Some("run_command"));
    }

    #[test]
    fn test_message_round_trips_through_jsonl_line() {
        let call = ToolCall::with_id("call_7", "run_command", Map::new());
        let msg = Message::assistant_with_tool_call("", call);
        let line = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&line).unwrap();
        assert_eq!(back, msg);
        assert!(back.has_tool_call());
    }

    #[test]
    fn test_generated_tool_call_ids_are_unique() {
        let a = ToolCall::new("run_command", Map::new());
        let b = ToolCall::new("run_command", Map::new());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("call_"));
    }
}
