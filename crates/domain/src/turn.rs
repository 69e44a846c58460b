//! Conversation transcript types.
//!
//! A [`Turn`] is one step of a simulated conversation; a completed
//! simulation yields a [`ConversationResult`] carrying the ordered turn
//! sequence plus aggregate counters. Turns are append-only while a
//! simulation runs and immutable once persisted.

use serde::{Deserialize, Serialize};

use crate::tool::{Role, ToolCall, ToolResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Present only on assistant turns that invoked tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Aligned with `tool_calls` by id, same length.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    /// Observed wall-clock latency for the LLM call that produced this turn.
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    /// Gold-standard answer copied in from the scenario template before
    /// reference-based evaluation. Only ever set on user turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            latency_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            expected_response: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        latency_ms: u64,
        input_tokens: u32,
        output_tokens: u32,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            latency_ms,
            input_tokens,
            output_tokens,
            expected_response: None,
        }
    }

    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        tool_results: Vec<ToolResult>,
        latency_ms: u64,
        input_tokens: u32,
        output_tokens: u32,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_results,
            latency_ms,
            input_tokens,
            output_tokens,
            expected_response: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    GoalAchieved,
    Frustrated,
}

impl ConversationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// True for every terminal state except `Failed`. Successful
    /// conversations are the ones the evaluation stage picks up.
    pub fn is_successful(self) -> bool {
        matches!(self, Self::Completed | Self::GoalAchieved | Self::Frustrated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::GoalAchieved => "goal_achieved",
            Self::Frustrated => "frustrated",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The outcome of one simulated conversation.
///
/// `turn_count` counts **user** turns only; `total_tokens` is always the
/// sum of the input and output counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResult {
    pub turns: Vec<Turn>,
    pub turn_count: u32,
    pub total_tokens: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Summed latency across assistant turns.
    pub total_latency_ms: u64,
    pub status: ConversationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConversationResult {
    /// An empty, successfully-completed result (`max_turns = 0` path).
    pub fn empty() -> Self {
        Self {
            turns: Vec::new(),
            turn_count: 0,
            total_tokens: 0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_latency_ms: 0,
            status: ConversationStatus::Completed,
            error_message: None,
        }
    }
}
