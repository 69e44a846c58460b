//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, and any other endpoint
//! that follows the OpenAI chat completions contract. This is the only
//! file in the workspace that talks to a model API.

use cq_domain::config::LlmConfig;
use cq_domain::error::{Error, Result};
use cq_domain::tool::{Message, Role, ToolCall, ToolDefinition};
use serde_json::Value;

use crate::traits::{normalize_tool_arguments, ChatRequest, ChatResponse, LlmClient};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatClient {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create an adapter from the LLM section of the harness config.
    /// The API key is read from the configured environment variable;
    /// absence means no auth header (local inference servers).
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.default_model.clone(),
            client,
        })
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        if req.model.is_empty() {
            self.default_model.clone()
        } else {
            req.model.clone()
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut messages: Vec<Value> = Vec::with_capacity(req.messages.len() + 1);
        if let Some(system) = &req.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.extend(req.messages.iter().map(msg_to_openai));

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let model = self.effective_model(&req);
        let body = self.build_body(&req);

        tracing::debug!(
            model = %model,
            message_count = req.messages.len(),
            has_tools = !req.tools.is_empty(),
            "llm request"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.header("Authorization", format!("Bearer {key}"));
        }

        let resp = http
            .send()
            .await
            .map_err(|e| Error::llm("openai_compat", e.to_string()))?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| Error::llm("openai_compat", format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let detail = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(Error::llm(
                "openai_compat",
                format!("HTTP {status}: {detail}"),
            ));
        }

        let response = parse_completion(&payload, &model)?;
        tracing::debug!(
            model = %response.model,
            content_length = response.content.len(),
            tool_call_count = response.tool_calls.len(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "llm response"
        );
        Ok(response)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    let mut out = serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    });
    if !msg.tool_calls.is_empty() {
        let calls: Vec<Value> = msg
            .tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    },
                })
            })
            .collect();
        out["tool_calls"] = Value::Array(calls);
    }
    if let Some(call_id) = &msg.tool_call_id {
        out["tool_call_id"] = Value::String(call_id.clone());
    }
    out
}

fn tool_to_openai(def: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters,
        },
    })
}

/// Normalize a chat completions payload into a [`ChatResponse`].
fn parse_completion(payload: &Value, requested_model: &str) -> Result<ChatResponse> {
    let message = payload["choices"]
        .get(0)
        .map(|c| &c["message"])
        .ok_or_else(|| Error::llm("openai_compat", "response has no choices"))?;

    let content = message["content"].as_str().unwrap_or("").to_string();

    let mut tool_calls = Vec::new();
    if let Some(raw_calls) = message["tool_calls"].as_array() {
        for (i, raw) in raw_calls.iter().enumerate() {
            let name = raw["function"]["name"].as_str().unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }
            let id = raw["id"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("call_{i}"));
            let arguments = normalize_tool_arguments(raw["function"]["arguments"].clone());
            tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    let usage = &payload["usage"];
    let input_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0) as u32;
    let output_tokens = usage["completion_tokens"].as_u64().unwrap_or(0) as u32;

    Ok(ChatResponse {
        content,
        tool_calls,
        input_tokens,
        output_tokens,
        model: payload["model"]
            .as_str()
            .unwrap_or(requested_model)
            .to_string(),
        stop_reason: payload["choices"][0]["finish_reason"]
            .as_str()
            .unwrap_or("")
            .to_string(),
    })
}
