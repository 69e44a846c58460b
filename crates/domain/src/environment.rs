//! Simulation environment constraints.
//!
//! Controls conversation boundaries, tool failure injection, and
//! adversarial scheduling for one run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationEnvironment {
    /// Maximum number of **user** turns.
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
    /// Hard token budget (input + output), checked after each step.
    #[serde(default = "d_max_total_tokens")]
    pub max_total_tokens: u64,
    /// Wall-clock bound for the whole conversation.
    #[serde(default = "d_timeout_seconds")]
    pub timeout_seconds: f64,
    /// Probability in [0, 1] that any tool call fails.
    #[serde(default)]
    pub tool_failure_rate: f64,
    /// Injected latency per tool call.
    #[serde(default)]
    pub tool_latency_ms: u64,
    /// Turn indices at which the adversarial injector fires.
    #[serde(default)]
    pub adversarial_turns: BTreeSet<u32>,
}

fn d_max_turns() -> u32 {
    10
}

fn d_max_total_tokens() -> u64 {
    50_000
}

fn d_timeout_seconds() -> f64 {
    120.0
}

impl Default for SimulationEnvironment {
    fn default() -> Self {
        Self {
            max_turns: d_max_turns(),
            max_total_tokens: d_max_total_tokens(),
            timeout_seconds: d_timeout_seconds(),
            tool_failure_rate: 0.0,
            tool_latency_ms: 0,
            adversarial_turns: BTreeSet::new(),
        }
    }
}

impl SimulationEnvironment {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tool_failure_rate) {
            return Err(Error::Validation(format!(
                "tool_failure_rate {} outside [0, 1]",
                self.tool_failure_rate
            )));
        }
        if self.timeout_seconds < 0.0 {
            return Err(Error::Validation("timeout_seconds must be >= 0".into()));
        }
        Ok(())
    }
}
