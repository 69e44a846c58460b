use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cq_domain::config::{Config, ConfigSeverity};
use cq_domain::persona::AgentPersona;
use cq_domain::run::{EvalRun, RunStatus};
use cq_domain::scenario::Scenario;
use cq_harness::cli::{self, Cli, Command};
use cq_harness::consumers::spawn_consumers;
use cq_harness::simulation::SimulationService;
use cq_harness::state::SharedState;
use cq_pipeline::{EventProducer, MessageBroker};
use cq_providers::OpenAiCompatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            agent,
            scenario,
            conversations,
        } => {
            init_tracing();
            let config = cli::load_config(config.as_deref()).context("loading config")?;
            let agent = cli::load_agent(&agent).context("loading agent persona")?;
            let scenario = cli::load_scenario(&scenario).context("loading scenario")?;
            run_eval(Arc::new(config), agent, scenario, conversations).await
        }
        Command::Version => {
            println!("colloquy {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cq_harness=debug")),
        )
        .init();
}

/// Wire the state, start the consumers, execute the run, and wait for
/// the pipeline to finish it.
async fn run_eval(
    config: Arc<Config>,
    agent: AgentPersona,
    scenario: Scenario,
    conversations: Option<u32>,
) -> anyhow::Result<()> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config validation failed");
    }

    // ── LLM client ───────────────────────────────────────────────────
    let llm = Arc::new(
        OpenAiCompatClient::from_config(&config.llm).context("initializing LLM client")?,
    );
    tracing::info!(base_url = %config.llm.base_url, "LLM client ready");

    // ── Pipeline + stores ────────────────────────────────────────────
    let broker = Arc::new(MessageBroker::new());
    let producer = EventProducer::initialize(broker.clone());
    let state_path = config.workspace.state_path.clone();
    std::fs::create_dir_all(&state_path)
        .with_context(|| format!("creating state path {}", state_path.display()))?;
    let state = SharedState::new(config.clone(), llm, broker, producer, &state_path);
    tracing::info!(state_path = %state_path.display(), "stores ready");

    let handles = spawn_consumers(&state);
    tracing::info!(consumers = handles.len(), "pipeline consumers started");

    // ── Create and execute the run ───────────────────────────────────
    let num_conversations =
        conversations.unwrap_or(state.config.simulation.num_conversations);
    let run = EvalRun::new(agent, scenario, num_conversations);
    let run_id = state.runs.insert(run);
    tracing::info!(run_id = %run_id, num_conversations, "eval run created");

    SimulationService::new(state.clone())
        .run_eval(run_id)
        .await
        .context("simulation failed")?;

    // ── Wait for the pipeline to mark the run completed ──────────────
    let deadline =
        std::time::Instant::now() + Duration::from_secs(state.config.simulation.completion_wait_secs);
    loop {
        match state.runs.status(&run_id) {
            Some(status) if status.is_terminal() => break,
            _ if std::time::Instant::now() > deadline => {
                tracing::warn!(run_id = %run_id, "timed out waiting for run completion");
                break;
            }
            _ => tokio::time::sleep(Duration::from_millis(250)).await,
        }
    }

    print_summary(&state, &run_id);

    for handle in handles {
        handle.stop().await;
    }
    Ok(())
}

fn print_summary(state: &SharedState, run_id: &uuid::Uuid) {
    let Some(run) = state.runs.get(run_id) else {
        return;
    };
    println!("run {}: {}", run_id, run.status.as_str());

    for conversation in state.conversations.by_run(run_id) {
        println!(
            "  conversation {} [{}]: {} turns, {} tokens, {} ms",
            conversation.sequence_num,
            conversation.status.as_str(),
            conversation.turn_count,
            conversation.total_tokens,
            conversation.total_latency_ms,
        );
        for evaluation in state.evaluations.by_conversation(&conversation.id) {
            println!(
                "    {}: {:.2}",
                evaluation.evaluator_type.as_str(),
                evaluation.overall_score,
            );
        }
    }

    if run.status == RunStatus::Failed {
        if let Some(error) = &run.error_message {
            println!("  error: {error}");
        }
    }
}
