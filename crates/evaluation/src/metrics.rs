//! Automated metrics — deterministic numbers derived from conversation
//! structure, token counts, latency, and tool usage. No LLM involved.

use cq_domain::eval::MetricValue;
use cq_domain::tool::Role;
use cq_domain::turn::{ConversationResult, ConversationStatus};

use crate::{round2, round4};

/// Compute the full metric set for a completed conversation.
pub fn compute_automated_metrics(result: &ConversationResult) -> Vec<MetricValue> {
    let mut metrics = Vec::with_capacity(8);

    // ── Token metrics ──────────────────────────────────────────────
    let tokens_per_turn = if result.turn_count > 0 {
        result.total_tokens as f64 / result.turn_count as f64
    } else {
        0.0
    };
    metrics.push(MetricValue::new(
        "tokens_per_turn",
        round2(tokens_per_turn),
        "tokens",
    ));

    let output_input_ratio = if result.total_input_tokens > 0 {
        result.total_output_tokens as f64 / result.total_input_tokens as f64
    } else {
        0.0
    };
    metrics.push(MetricValue::new(
        "output_input_ratio",
        round4(output_input_ratio),
        "ratio",
    ));

    // ── Latency metrics ────────────────────────────────────────────
    let latencies: Vec<u64> = result
        .turns
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .map(|t| t.latency_ms)
        .collect();

    let avg_latency = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
    };
    metrics.push(MetricValue::new("avg_latency_ms", round2(avg_latency), "ms"));

    let p95_latency = if latencies.is_empty() {
        0.0
    } else {
        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 * 0.95) as usize).saturating_sub(1);
        sorted[idx] as f64
    };
    metrics.push(MetricValue::new("p95_latency_ms", round2(p95_latency), "ms"));

    // ── Resolution metrics ─────────────────────────────────────────
    metrics.push(MetricValue::new(
        "turns_to_resolution",
        result.turn_count as f64,
        "turns",
    ));

    let completed = matches!(
        result.status,
        ConversationStatus::Completed | ConversationStatus::GoalAchieved
    );
    metrics.push(MetricValue::new(
        "conversation_completed",
        if completed { 1.0 } else { 0.0 },
        "boolean",
    ));

    // ── Tool usage metrics ─────────────────────────────────────────
    let tool_call_count: usize = result.turns.iter().map(|t| t.tool_calls.len()).sum();
    metrics.push(MetricValue::new(
        "tool_call_count",
        tool_call_count as f64,
        "count",
    ));

    let tool_results: Vec<_> = result.turns.iter().flat_map(|t| &t.tool_results).collect();
    let tool_success_rate = if tool_results.is_empty() {
        // No tools called means no failures.
        1.0
    } else {
        tool_results.iter().filter(|r| !r.is_error).count() as f64 / tool_results.len() as f64
    };
    metrics.push(MetricValue::new(
        "tool_success_rate",
        round4(tool_success_rate),
        "ratio",
    ));

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::tool::{ToolCall, ToolResult};
    use cq_domain::turn::Turn;

    fn get(metrics: &[MetricValue], name: &str) -> f64 {
        metrics.iter().find(|m| m.name == name).unwrap().value
    }

    fn base_result(turns: Vec<Turn>, status: ConversationStatus) -> ConversationResult {
        let turn_count = turns.iter().filter(|t| t.role == Role::User).count() as u32;
        let total_input: u64 = turns.iter().map(|t| t.input_tokens as u64).sum();
        let total_output: u64 = turns.iter().map(|t| t.output_tokens as u64).sum();
        ConversationResult {
            turn_count,
            total_tokens: total_input + total_output,
            total_input_tokens: total_input,
            total_output_tokens: total_output,
            total_latency_ms: turns.iter().map(|t| t.latency_ms).sum(),
            turns,
            status,
            error_message: None,
        }
    }

    #[test]
    fn token_and_latency_metrics() {
        let result = base_result(
            vec![
                Turn::user("q"),
                Turn::assistant("a", 100, 40, 20),
                Turn::user("q2"),
                Turn::assistant("b", 200, 20, 20),
            ],
            ConversationStatus::Completed,
        );
        let metrics = compute_automated_metrics(&result);

        assert_eq!(get(&metrics, "tokens_per_turn"), 50.0); // 100 tokens / 2 user turns
        assert_eq!(get(&metrics, "output_input_ratio"), 0.6667);
        assert_eq!(get(&metrics, "avg_latency_ms"), 150.0);
        assert_eq!(get(&metrics, "p95_latency_ms"), 100.0);
        assert_eq!(get(&metrics, "turns_to_resolution"), 2.0);
        assert_eq!(get(&metrics, "conversation_completed"), 1.0);
    }

    #[test]
    fn tool_metrics_with_mixed_results() {
        let tool_turn = Turn::assistant_with_tools(
            "",
            vec![
                ToolCall {
                    id: "a".into(),
                    name: "search".into(),
                    arguments: serde_json::json!({}),
                },
                ToolCall {
                    id: "b".into(),
                    name: "read_file".into(),
                    arguments: serde_json::json!({}),
                },
            ],
            vec![
                ToolResult {
                    tool_call_id: "a".into(),
                    content: "{}".into(),
                    is_error: false,
                },
                ToolResult {
                    tool_call_id: "b".into(),
                    content: "{}".into(),
                    is_error: true,
                },
            ],
            10,
            5,
            5,
        );
        let result = base_result(
            vec![Turn::user("q"), tool_turn],
            ConversationStatus::Completed,
        );
        let metrics = compute_automated_metrics(&result);
        assert_eq!(get(&metrics, "tool_call_count"), 2.0);
        assert_eq!(get(&metrics, "tool_success_rate"), 0.5);
    }

    #[test]
    fn no_tools_means_success_rate_one() {
        let result = base_result(
            vec![Turn::user("q"), Turn::assistant("a", 5, 1, 1)],
            ConversationStatus::Completed,
        );
        let metrics = compute_automated_metrics(&result);
        assert_eq!(get(&metrics, "tool_call_count"), 0.0);
        assert_eq!(get(&metrics, "tool_success_rate"), 1.0);
    }

    #[test]
    fn goal_achieved_counts_as_completed() {
        let result = base_result(vec![Turn::user("q")], ConversationStatus::GoalAchieved);
        assert_eq!(
            get(&compute_automated_metrics(&result), "conversation_completed"),
            1.0
        );

        let failed = base_result(vec![Turn::user("q")], ConversationStatus::Failed);
        assert_eq!(
            get(&compute_automated_metrics(&failed), "conversation_completed"),
            0.0
        );
    }

    #[test]
    fn empty_conversation_is_all_zero_except_success_rate() {
        let result = ConversationResult::empty();
        let metrics = compute_automated_metrics(&result);
        assert_eq!(get(&metrics, "tokens_per_turn"), 0.0);
        assert_eq!(get(&metrics, "avg_latency_ms"), 0.0);
        assert_eq!(get(&metrics, "p95_latency_ms"), 0.0);
        assert_eq!(get(&metrics, "tool_success_rate"), 1.0);
    }
}
