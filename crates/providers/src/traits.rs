use cq_domain::error::Result;
use cq_domain::tool::{Message, ToolCall, ToolDefinition};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model identifier. Empty lets the adapter pick its default.
    pub model: String,
    /// The conversation messages to send, in order.
    pub messages: Vec<Message>,
    /// System prompt, prepended ahead of `messages` when present.
    pub system: Option<String>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
}

/// A provider-agnostic, normalized chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Textual content of the response.
    pub content: String,
    /// Tool calls emitted by the model, arguments already normalized to
    /// structured JSON mappings.
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// The model that actually produced the response.
    pub model: String,
    /// Why generation stopped (e.g. "stop", "tool_calls").
    pub stop_reason: String,
}

impl ChatResponse {
    /// A plain text response with fixed token accounting. Handy for
    /// scripting the seam in tests.
    pub fn text(content: impl Into<String>, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            input_tokens,
            output_tokens,
            model: "scripted".into(),
            stop_reason: "stop".into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM adapter must implement.
///
/// The client performs **no** retries; callers decide how to handle
/// failures.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Argument normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize tool-call arguments from the wire into a structured mapping.
///
/// Providers deliver arguments either as a JSON object or as a string
/// containing JSON. Strings that fail to parse are wrapped as
/// `{"raw": <string>}` so the payload is never lost.
pub fn normalize_tool_arguments(raw: Value) -> Value {
    match raw {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) if parsed.is_object() => parsed,
            _ => serde_json::json!({ "raw": s }),
        },
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}
