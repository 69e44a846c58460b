//! Scripted client for deterministic simulations and tests.
//!
//! Responses are queued up front and returned in order; every request is
//! recorded so assertions can inspect what the engine actually sent.

use std::collections::VecDeque;

use cq_domain::error::{Error, Result};
use cq_domain::tool::ToolCall;
use parking_lot::Mutex;

use crate::traits::{ChatRequest, ChatResponse, LlmClient};

#[derive(Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary response.
    pub fn push(&self, response: ChatResponse) {
        self.responses.lock().push_back(response);
    }

    /// Queue a plain-text response with fixed token counts.
    pub fn push_text(&self, content: &str, input_tokens: u32, output_tokens: u32) {
        self.push(ChatResponse::text(content, input_tokens, output_tokens));
    }

    /// Queue a response carrying one tool call.
    pub fn push_tool_call(&self, content: &str, id: &str, name: &str, arguments: serde_json::Value) {
        self.push(ChatResponse {
            content: content.into(),
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
            input_tokens: 10,
            output_tokens: 10,
            model: "scripted".into(),
            stop_reason: "tool_calls".into(),
        });
    }

    /// All requests observed so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| Error::llm("scripted", "no scripted response left"))
    }
}
