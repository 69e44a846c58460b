//! LLM-driven user simulator.
//!
//! Generates the next user utterance from a persona. The trick is the
//! role swap: the simulator plays the *user*, so the conversation is
//! mirrored before it goes to the LLM — prior user messages become
//! "assistant" (its own past output) and the tested agent's messages
//! become "user" input.

use std::sync::Arc;

use cq_domain::error::Result;
use cq_domain::persona::UserPersona;
use cq_domain::tool::{Message, Role};
use cq_domain::turn::Turn;
use cq_providers::{ChatRequest, LlmClient};

const USER_SIM_TEMPERATURE: f32 = 0.8;
const USER_SIM_MAX_TOKENS: u32 = 500;

pub struct UserSimulator {
    llm: Arc<dyn LlmClient>,
    persona: UserPersona,
    initial_message: Option<String>,
}

impl UserSimulator {
    pub fn new(llm: Arc<dyn LlmClient>, persona: UserPersona, initial_message: Option<String>) -> Self {
        Self {
            llm,
            persona,
            initial_message: initial_message.filter(|m| !m.is_empty()),
        }
    }

    /// Generate the next user message.
    ///
    /// Turn 0 returns the template verbatim without touching the LLM
    /// when one is configured.
    pub async fn next_message(&self, history: &[Turn], turn_index: u32) -> Result<String> {
        if turn_index == 0 {
            if let Some(template) = &self.initial_message {
                tracing::debug!(turn = turn_index, "user simulator using template");
                return Ok(template.clone());
            }
        }

        let mut messages: Vec<Message> = history
            .iter()
            .filter_map(|turn| match turn.role {
                Role::User => Some(Message::assistant(&turn.content)),
                Role::Assistant => Some(Message::user(&turn.content)),
                _ => None,
            })
            .collect();

        // Nothing happened yet: ask the simulator to open the conversation.
        if messages.is_empty() {
            messages.push(Message::user(format!(
                "Start a conversation. Your goal: {}",
                self.persona.goal
            )));
        }

        let response = self
            .llm
            .chat(ChatRequest {
                model: self.persona.model.clone(),
                messages,
                system: Some(self.persona.system_prompt()),
                tools: Vec::new(),
                temperature: USER_SIM_TEMPERATURE,
                max_tokens: USER_SIM_MAX_TOKENS,
            })
            .await?;

        tracing::debug!(
            turn = turn_index,
            content_length = response.content.len(),
            "user simulator generated"
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_providers::ScriptedLlmClient;

    fn persona() -> UserPersona {
        UserPersona {
            personality: "curious".into(),
            expertise_level: "novice".into(),
            goal: "get directions".into(),
            model: "sim-model".into(),
        }
    }

    #[tokio::test]
    async fn turn_zero_uses_template_without_llm() {
        let llm = Arc::new(ScriptedLlmClient::new());
        let sim = UserSimulator::new(llm.clone(), persona(), Some("Help me".into()));

        let msg = sim.next_message(&[], 0).await.unwrap();
        assert_eq!(msg, "Help me");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn later_turns_swap_roles() {
        let scripted = Arc::new(ScriptedLlmClient::new());
        scripted.push_text("Thanks, that helps", 5, 5);
        let llm: Arc<dyn LlmClient> = scripted.clone();
        let sim = UserSimulator::new(llm, persona(), Some("Help me".into()));

        let history = vec![
            Turn::user("Help me"),
            Turn::assistant("Try turning it off and on", 10, 5, 5),
        ];
        let msg = sim.next_message(&history, 1).await.unwrap();
        assert_eq!(msg, "Thanks, that helps");

        let req = &scripted.requests()[0];
        // Prior user turn appears as assistant, agent turn as user.
        assert_eq!(req.messages[0].role, Role::Assistant);
        assert_eq!(req.messages[0].content, "Help me");
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.messages[1].content, "Try turning it off and on");
        assert_eq!(req.temperature, USER_SIM_TEMPERATURE);
        assert_eq!(req.max_tokens, USER_SIM_MAX_TOKENS);
        assert_eq!(req.model, "sim-model");
        assert!(req.system.as_deref().unwrap().contains("[GOAL_ACHIEVED]"));
    }

    #[tokio::test]
    async fn empty_history_without_template_prompts_for_opening() {
        let scripted = Arc::new(ScriptedLlmClient::new());
        scripted.push_text("Hi, I need directions", 5, 5);
        let llm: Arc<dyn LlmClient> = scripted.clone();
        let sim = UserSimulator::new(llm, persona(), None);

        let msg = sim.next_message(&[], 0).await.unwrap();
        assert_eq!(msg, "Hi, I need directions");

        let req = &scripted.requests()[0];
        assert_eq!(req.messages.len(), 1);
        assert!(req.messages[0].content.contains("get directions"));
    }
}
