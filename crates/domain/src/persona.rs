//! Agent and user personas.
//!
//! Personas are immutable configuration records: the agent persona
//! describes the system under test, the user persona drives the simulated
//! counterpart. The user persona's system prompt is a pure function of
//! its fields and embeds the termination sentinels.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tool::ToolDefinition;

/// Literal substring the simulated user emits when its goal is met.
pub const GOAL_ACHIEVED: &str = "[GOAL_ACHIEVED]";
/// Literal substring the simulated user emits when it gives up.
pub const FRUSTRATED: &str = "[FRUSTRATED]";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent persona
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the agent under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPersona {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

fn d_temperature() -> f32 {
    0.7
}

fn d_max_tokens() -> u32 {
    4096
}

impl AgentPersona {
    /// Range checks for the sampling parameters.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Validation(format!(
                "agent temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::Validation("agent max_tokens must be >= 1".into()));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User persona
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the simulated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPersona {
    #[serde(default = "d_personality")]
    pub personality: String,
    #[serde(default = "d_expertise")]
    pub expertise_level: String,
    #[serde(default = "d_goal")]
    pub goal: String,
    pub model: String,
}

fn d_personality() -> String {
    "neutral".into()
}

fn d_expertise() -> String {
    "intermediate".into()
}

fn d_goal() -> String {
    "Get help with a task".into()
}

impl UserPersona {
    /// The simulator system prompt. Derived entirely from the persona
    /// fields; includes the sentinel instructions verbatim.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are simulating a real user in a conversation with an AI assistant.\n\
             \n\
             Your persona:\n\
             - Personality: {personality}\n\
             - Expertise level: {expertise}\n\
             - Goal: {goal}\n\
             \n\
             Guidelines:\n\
             - Stay in character throughout the entire conversation\n\
             - React naturally to the assistant's responses\n\
             - If the assistant solves your problem, say {goal_achieved} in your message\n\
             - If the assistant is unhelpful after 3+ turns, say {frustrated} in your message\n\
             - Keep responses concise (1-3 sentences typically)\n\
             - Ask follow-up questions if the answer is unclear\n\
             - Do NOT break character or acknowledge you are simulating",
            personality = self.personality,
            expertise = self.expertise_level,
            goal = self.goal,
            goal_achieved = GOAL_ACHIEVED,
            frustrated = FRUSTRATED,
        )
    }
}
