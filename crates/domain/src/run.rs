//! Evaluation run records.
//!
//! An [`EvalRun`] tracks one batch of simulated conversations from
//! creation through simulation, evaluation, and aggregation. Status
//! transitions are enforced here: terminal states are sticky and
//! cancellation is only reachable from the active states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::persona::AgentPersona;
use crate::scenario::Scenario;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    RunningSimulation,
    RunningEvaluation,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transition from `self` to `to` is allowed.
    ///
    /// Forward progress only: pending → running_simulation →
    /// running_evaluation → completed. Failure is reachable from any
    /// active state, cancellation from pending or either running state.
    pub fn can_transition(self, to: RunStatus) -> bool {
        use RunStatus::*;
        match (self, to) {
            (Pending, RunningSimulation) => true,
            (RunningSimulation, RunningEvaluation) => true,
            (RunningEvaluation, Completed) => true,
            (Pending | RunningSimulation | RunningEvaluation, Failed) => true,
            (Pending | RunningSimulation | RunningEvaluation, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::RunningSimulation => "running_simulation",
            Self::RunningEvaluation => "running_evaluation",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRun {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub agent: AgentPersona,
    pub scenario: Scenario,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_id: Option<Uuid>,
    pub status: RunStatus,
    pub num_conversations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvalRun {
    pub fn new(agent: AgentPersona, scenario: Scenario, num_conversations: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            agent,
            scenario,
            rubric_id: None,
            status: RunStatus::Pending,
            num_conversations,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::RunningSimulation.is_terminal());
        assert!(!RunStatus::RunningEvaluation.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn forward_transitions_allowed() {
        use RunStatus::*;
        assert!(Pending.can_transition(RunningSimulation));
        assert!(RunningSimulation.can_transition(RunningEvaluation));
        assert!(RunningEvaluation.can_transition(Completed));
    }

    #[test]
    fn cancellation_only_from_active_states() {
        use RunStatus::*;
        assert!(Pending.can_transition(Cancelled));
        assert!(RunningSimulation.can_transition(Cancelled));
        assert!(RunningEvaluation.can_transition(Cancelled));
        assert!(!Completed.can_transition(Cancelled));
        assert!(!Failed.can_transition(Cancelled));
        assert!(!Cancelled.can_transition(Cancelled));
    }

    #[test]
    fn terminal_states_are_sticky() {
        use RunStatus::*;
        for terminal in [Completed, Failed, Cancelled] {
            for target in [
                Pending,
                RunningSimulation,
                RunningEvaluation,
                Completed,
                Failed,
                Cancelled,
            ] {
                assert!(!terminal.can_transition(target));
            }
        }
    }

    #[test]
    fn no_skipping_ahead() {
        use RunStatus::*;
        assert!(!Pending.can_transition(RunningEvaluation));
        assert!(!Pending.can_transition(Completed));
        assert!(!RunningSimulation.can_transition(Completed));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::RunningSimulation).unwrap(),
            "\"running_simulation\""
        );
        assert_eq!(RunStatus::RunningEvaluation.as_str(), "running_evaluation");
    }
}
