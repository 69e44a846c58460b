//! Transcript formatting shared by the judge evaluators.

use cq_domain::turn::Turn;

/// Render turns as a labeled plain-text transcript for a judge prompt.
/// Tool calls and results are shown inline; result payloads are clipped.
pub(crate) fn format_transcript(turns: &[Turn], label: &str) -> String {
    let mut lines = vec![format!("## {label}\n")];
    for (i, turn) in turns.iter().enumerate() {
        let role = format!("{:?}", turn.role).to_uppercase();
        lines.push(format!("[Turn {i}] {role}: {}", turn.content));

        for tc in &turn.tool_calls {
            lines.push(format!("  → TOOL_CALL: {}({})", tc.name, tc.arguments));
        }
        for tr in &turn.tool_results {
            let status = if tr.is_error { "ERROR" } else { "OK" };
            lines.push(format!(
                "  ← TOOL_RESULT [{status}]: {}",
                clip(&tr.content, 200)
            ));
        }
    }
    lines.join("\n")
}

fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::tool::{ToolCall, ToolResult};

    #[test]
    fn renders_roles_tools_and_errors() {
        let turns = vec![
            Turn::user("What's the weather?"),
            Turn::assistant_with_tools(
                "",
                vec![ToolCall {
                    id: "c1".into(),
                    name: "get_weather".into(),
                    arguments: serde_json::json!({"city": "London"}),
                }],
                vec![ToolResult {
                    tool_call_id: "c1".into(),
                    content: "boom".into(),
                    is_error: true,
                }],
                5,
                1,
                1,
            ),
        ];
        let text = format_transcript(&turns, "Conversation Transcript");
        assert!(text.starts_with("## Conversation Transcript"));
        assert!(text.contains("[Turn 0] USER: What's the weather?"));
        assert!(text.contains("TOOL_CALL: get_weather"));
        assert!(text.contains("TOOL_RESULT [ERROR]: boom"));
    }

    #[test]
    fn clips_long_tool_results() {
        let turns = vec![Turn::assistant_with_tools(
            "",
            vec![],
            vec![ToolResult {
                tool_call_id: "c1".into(),
                content: "x".repeat(500),
                is_error: false,
            }],
            0,
            0,
            0,
        )];
        let text = format_transcript(&turns, "T");
        let result_line = text.lines().last().unwrap();
        assert!(result_line.len() < 250);
    }
}
