//! Scenario definitions.
//!
//! A scenario bundles the simulated-user persona, an optional turn
//! template (initial message plus gold-standard answers), and the
//! environment constraints for a run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::environment::SimulationEnvironment;
use crate::persona::UserPersona;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn template
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One templated user turn. The first entry's `content` seeds the
/// conversation verbatim; `expected_response` feeds the reference
/// evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnTemplate {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub user_persona: UserPersona,
    #[serde(default)]
    pub turns_template: Vec<TurnTemplate>,
    #[serde(default)]
    pub constraints: SimulationEnvironment,
    /// Tool names the agent is expected to call, in order. Feeds the
    /// trajectory evaluator; empty means "no expectation".
    #[serde(default)]
    pub expected_tool_sequence: Vec<String>,
}

impl Scenario {
    /// The verbatim first user message, if the template provides one.
    pub fn initial_message(&self) -> Option<&str> {
        self.turns_template
            .first()
            .map(|t| t.content.as_str())
            .filter(|c| !c.is_empty())
    }

    /// True when any templated turn carries a gold-standard answer.
    pub fn has_reference_answers(&self) -> bool {
        self.turns_template
            .iter()
            .any(|t| t.expected_response.is_some())
    }

    pub fn has_expected_trajectory(&self) -> bool {
        !self.expected_tool_sequence.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Scenario {
        Scenario {
            id: Uuid::new_v4(),
            name: "weather-help".into(),
            user_persona: UserPersona {
                personality: "curious".into(),
                expertise_level: "novice".into(),
                goal: "learn the weather".into(),
                model: "gpt-4o-mini".into(),
            },
            turns_template: vec![
                TurnTemplate {
                    content: "What's the weather in London?".into(),
                    expected_response: Some("It is sunny.".into()),
                },
                TurnTemplate::default(),
            ],
            constraints: SimulationEnvironment::default(),
            expected_tool_sequence: vec!["get_weather".into()],
        }
    }

    #[test]
    fn initial_message_from_first_template() {
        let s = scenario();
        assert_eq!(s.initial_message(), Some("What's the weather in London?"));
    }

    #[test]
    fn empty_first_template_yields_no_initial_message() {
        let mut s = scenario();
        s.turns_template[0].content.clear();
        assert_eq!(s.initial_message(), None);
        s.turns_template.clear();
        assert_eq!(s.initial_message(), None);
    }

    #[test]
    fn reference_and_trajectory_flags() {
        let s = scenario();
        assert!(s.has_reference_answers());
        assert!(s.has_expected_trajectory());

        let mut bare = scenario();
        bare.turns_template.clear();
        bare.expected_tool_sequence.clear();
        assert!(!bare.has_reference_answers());
        assert!(!bare.has_expected_trajectory());
    }
}
