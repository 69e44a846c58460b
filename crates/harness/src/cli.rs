//! Command-line interface for the `colloquy` binary.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cq_domain::config::Config;
use cq_domain::error::{Error, Result};
use cq_domain::persona::AgentPersona;
use cq_domain::scenario::Scenario;

#[derive(Parser)]
#[command(name = "colloquy", about = "Conversational-agent evaluation harness")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an eval run and execute it end to end.
    Run {
        /// Harness configuration (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Agent persona definition (JSON).
        #[arg(long)]
        agent: PathBuf,
        /// Scenario definition (JSON).
        #[arg(long)]
        scenario: PathBuf,
        /// Conversations to simulate; overrides the configured default.
        #[arg(long)]
        conversations: Option<u32>,
    },
    /// Print the version.
    Version,
}

/// Load the TOML config, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
        }
        None => Ok(Config::default()),
    }
}

pub fn load_agent(path: &Path) -> Result<AgentPersona> {
    let raw = std::fs::read_to_string(path)?;
    let agent: AgentPersona = serde_json::from_str(&raw)?;
    agent.validate()?;
    Ok(agent)
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)?;
    let scenario: Scenario = serde_json::from_str(&raw)?;
    scenario.constraints.validate()?;
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_config_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.pipeline.max_retries, 3);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "config.toml", "[pipeline]\nmax_retries = 7\n");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.pipeline.max_retries, 7);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "config.toml", "not [valid");
        assert!(matches!(load_config(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn agent_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(
            dir.path(),
            "agent.json",
            r#"{"name":"a","system_prompt":"p","model":"m"}"#,
        );
        assert!(load_agent(&good).is_ok());

        let bad = write(
            dir.path(),
            "bad.json",
            r#"{"name":"a","system_prompt":"p","model":"m","temperature":9.0}"#,
        );
        assert!(load_agent(&bad).is_err());
    }

    #[test]
    fn scenario_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "scenario.json",
            r#"{
                "name": "weather",
                "user_persona": {"goal": "know the weather", "model": "m"},
                "turns_template": [{"content": "What's the weather?"}],
                "constraints": {"max_turns": 3},
                "expected_tool_sequence": ["get_weather"]
            }"#,
        );
        let scenario = load_scenario(&path).unwrap();
        assert_eq!(scenario.name, "weather");
        assert_eq!(scenario.initial_message(), Some("What's the weather?"));
        assert_eq!(scenario.constraints.max_turns, 3);
        assert!(scenario.has_expected_trajectory());
    }
}
