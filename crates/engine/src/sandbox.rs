//! Tool sandbox — stands in for real tool execution.
//!
//! Every agent tool call is intercepted here. The sandbox answers from a
//! canned response table and, under environment control, injects latency
//! and failures. No real tool ever runs.

use std::collections::BTreeMap;

use cq_domain::environment::SimulationEnvironment;
use cq_domain::tool::{ToolCall, ToolResult};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Canned responses for common tool families. Looked up by exact name
/// first, then by substring (so `search_docs` hits the `search` entry).
fn default_responses() -> BTreeMap<String, String> {
    let entries = [
        (
            "search",
            serde_json::json!({
                "results": [{
                    "title": "Example Result",
                    "snippet": "This is a simulated search result with relevant information.",
                }],
            }),
        ),
        (
            "get_weather",
            serde_json::json!({"temperature": 72, "condition": "sunny", "humidity": 45}),
        ),
        (
            "run_code",
            serde_json::json!({"output": "Hello, World!", "exit_code": 0}),
        ),
        (
            "read_file",
            serde_json::json!({"content": "# Example file content\nThis is simulated file data."}),
        ),
        (
            "write_file",
            serde_json::json!({"status": "success", "bytes_written": 256}),
        ),
    ];
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolSandbox {
    env: SimulationEnvironment,
    /// Sorted so substring matching scans in a deterministic order.
    responses: BTreeMap<String, String>,
    rng: Mutex<StdRng>,
}

impl ToolSandbox {
    /// Sandbox with the default response table, overlaid by any custom
    /// entries.
    pub fn new(env: SimulationEnvironment, custom_responses: BTreeMap<String, String>) -> Self {
        let mut responses = default_responses();
        responses.extend(custom_responses);
        Self {
            env,
            responses,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Sandbox with a fixed RNG seed, for reproducible failure injection.
    pub fn with_seed(
        env: SimulationEnvironment,
        custom_responses: BTreeMap<String, String>,
        seed: u64,
    ) -> Self {
        let mut sandbox = Self::new(env, custom_responses);
        sandbox.rng = Mutex::new(StdRng::seed_from_u64(seed));
        sandbox
    }

    /// Simulate a tool call, applying the environment conditions.
    pub async fn execute(&self, tool_call: &ToolCall) -> ToolResult {
        tracing::debug!(
            tool_name = %tool_call.name,
            tool_id = %tool_call.id,
            failure_rate = self.env.tool_failure_rate,
            "sandbox executing"
        );

        if self.env.tool_latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.env.tool_latency_ms)).await;
        }

        if self.env.tool_failure_rate > 0.0 {
            let draw: f64 = self.rng.lock().gen();
            if draw < self.env.tool_failure_rate {
                tracing::debug!(tool_name = %tool_call.name, "sandbox injected failure");
                return ToolResult {
                    tool_call_id: tool_call.id.clone(),
                    content: serde_json::json!({
                        "error": "Tool execution failed",
                        "message": format!("Simulated failure for tool '{}'", tool_call.name),
                    })
                    .to_string(),
                    is_error: true,
                };
            }
        }

        ToolResult {
            tool_call_id: tool_call.id.clone(),
            content: self.lookup_response(tool_call),
            is_error: false,
        }
    }

    /// Exact match, then substring match against registered keys, then a
    /// default acknowledgment echoing the call.
    fn lookup_response(&self, tool_call: &ToolCall) -> String {
        if let Some(resp) = self.responses.get(&tool_call.name) {
            return resp.clone();
        }
        for (key, resp) in &self.responses {
            if tool_call.name.contains(key.as_str()) {
                return resp.clone();
            }
        }
        serde_json::json!({
            "status": "success",
            "tool": tool_call.name,
            "input_received": tool_call.arguments,
            "message": format!("Tool '{}' executed successfully.", tool_call.name),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: name.into(),
            arguments: serde_json::json!({"q": "x"}),
        }
    }

    fn sandbox(env: SimulationEnvironment) -> ToolSandbox {
        ToolSandbox::with_seed(env, BTreeMap::new(), 7)
    }

    #[tokio::test]
    async fn exact_match_returns_canned_response() {
        let sb = sandbox(SimulationEnvironment::default());
        let result = sb.execute(&call("get_weather")).await;
        assert!(!result.is_error);
        assert_eq!(result.tool_call_id, "c1");
        let payload: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["condition"], "sunny");
        assert!(payload.get("temperature").is_some());
    }

    #[tokio::test]
    async fn substring_match_falls_back_to_family() {
        let sb = sandbox(SimulationEnvironment::default());
        let result = sb.execute(&call("search_docs")).await;
        let payload: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        assert!(payload.get("results").is_some());
    }

    #[tokio::test]
    async fn unknown_tool_gets_acknowledgment() {
        let sb = sandbox(SimulationEnvironment::default());
        let result = sb.execute(&call("teleport")).await;
        let payload: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["tool"], "teleport");
        assert_eq!(payload["input_received"]["q"], "x");
    }

    #[tokio::test]
    async fn custom_responses_overlay_defaults() {
        let mut custom = BTreeMap::new();
        custom.insert("get_weather".to_string(), r#"{"temperature": -5}"#.to_string());
        let sb = ToolSandbox::with_seed(SimulationEnvironment::default(), custom, 7);
        let result = sb.execute(&call("get_weather")).await;
        let payload: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["temperature"], -5);
    }

    #[tokio::test]
    async fn zero_failure_rate_never_fails() {
        let sb = sandbox(SimulationEnvironment::default());
        for _ in 0..50 {
            assert!(!sb.execute(&call("search")).await.is_error);
        }
    }

    #[tokio::test]
    async fn full_failure_rate_always_fails() {
        let env = SimulationEnvironment {
            tool_failure_rate: 1.0,
            ..Default::default()
        };
        let sb = sandbox(env);
        for _ in 0..50 {
            let result = sb.execute(&call("search")).await;
            assert!(result.is_error);
            let payload: serde_json::Value = serde_json::from_str(&result.content).unwrap();
            assert_eq!(payload["error"], "Tool execution failed");
        }
    }

    #[tokio::test]
    async fn latency_injection_delays_result() {
        let env = SimulationEnvironment {
            tool_latency_ms: 30,
            ..Default::default()
        };
        let sb = sandbox(env);
        let start = std::time::Instant::now();
        sb.execute(&call("search")).await;
        assert!(start.elapsed() >= std::time::Duration::from_millis(30));
    }
}
