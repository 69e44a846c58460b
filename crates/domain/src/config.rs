//! Harness configuration, loaded from a TOML file.
//!
//! Every section has serde defaults so a minimal (or empty) file still
//! produces a runnable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding the JSONL stores.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from(".colloquy/state")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. Empty key = no auth
    /// header (local inference servers).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_default_model")]
    pub default_model: String,
    /// Model used by the judge evaluators.
    #[serde(default = "d_judge_model")]
    pub judge_model: String,
    /// Request timeout for chat completions.
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            default_model: d_default_model(),
            judge_model: d_judge_model(),
            request_timeout_secs: d_request_timeout_secs(),
        }
    }
}

fn d_base_url() -> String {
    "http://localhost:11434/v1".into()
}

fn d_api_key_env() -> String {
    "CQ_LLM_API_KEY".into()
}

fn d_default_model() -> String {
    "gpt-4o-mini".into()
}

fn d_judge_model() -> String {
    "gpt-4o".into()
}

fn d_request_timeout_secs() -> u64 {
    120
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Handler attempts before a message is dead-lettered.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Consumer group shared by the built-in consumers.
    #[serde(default = "d_consumer_group")]
    pub consumer_group: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: d_max_retries(),
            consumer_group: d_consumer_group(),
        }
    }
}

fn d_max_retries() -> u32 {
    3
}

fn d_consumer_group() -> String {
    "colloquy".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Simulation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Conversations per run when the caller does not specify a count.
    #[serde(default = "d_num_conversations")]
    pub num_conversations: u32,
    /// How long the CLI waits for the pipeline to mark a run completed.
    #[serde(default = "d_completion_wait_secs")]
    pub completion_wait_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_conversations: d_num_conversations(),
            completion_wait_secs: d_completion_wait_secs(),
        }
    }
}

fn d_num_conversations() -> u32 {
    5
}

fn d_completion_wait_secs() -> u64 {
    60
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Config {
    /// Sanity-check the configuration, returning a list of issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.llm.base_url.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "llm.base_url must not be empty".into(),
            });
        }
        if self.pipeline.max_retries == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "pipeline.max_retries = 0: every handler failure dead-letters immediately"
                    .into(),
            });
        }
        if self.simulation.num_conversations == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "simulation.num_conversations = 0: runs will produce no conversations"
                    .into(),
            });
        }

        issues
    }
}
