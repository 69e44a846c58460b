//! Simulation service: run a batch of conversations for an eval run.
//!
//! Loads the run's personas and constraints, drives the orchestrator
//! once per conversation, commits each result, and emits a
//! `agent.conversation.completed` event per conversation. Event
//! publishing is best-effort: the conversation is committed whether or
//! not the event goes out.

use cq_domain::error::{Error, Result};
use cq_domain::run::RunStatus;
use cq_domain::turn::ConversationStatus;
use cq_engine::{
    AdversarialInjector, CancelToken, ConversationOrchestrator, ToolSandbox, UserSimulator,
};
use cq_pipeline::{topics, ConversationCompletedEvent};
use uuid::Uuid;

use crate::state::SharedState;
use crate::stores::ConversationRecord;

pub struct SimulationService {
    state: SharedState,
}

impl SimulationService {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Execute every conversation for an eval run.
    ///
    /// Cancellation is observed between conversations and, through the
    /// shared token, at turn boundaries inside the orchestrator.
    pub async fn run_eval(&self, run_id: Uuid) -> Result<()> {
        let run = self
            .state
            .runs
            .get(&run_id)
            .ok_or_else(|| Error::NotFound(format!("eval run {run_id}")))?;

        run.agent.validate()?;
        run.scenario.constraints.validate()?;
        self.state.runs.transition(&run_id, RunStatus::RunningSimulation)?;

        let cancel = self.state.cancels.register(run_id);
        let initial_message = run.scenario.initial_message().map(String::from);

        tracing::info!(
            run_id = %run_id,
            agent = %run.agent.name,
            num_conversations = run.num_conversations,
            "simulation starting"
        );

        for sequence_num in 0..run.num_conversations {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, sequence_num, "simulation cancelled");
                break;
            }
            self.run_single_conversation(&run_id, sequence_num, initial_message.clone(), &cancel)
                .await;
        }

        self.state.cancels.remove(&run_id);

        // A cancelled run keeps its status; anything else moves on to
        // evaluation.
        if self.state.runs.status(&run_id) == Some(RunStatus::RunningSimulation) {
            self.state
                .runs
                .transition(&run_id, RunStatus::RunningEvaluation)?;
        }
        Ok(())
    }

    /// Cancel a run: transition its status and flag the running
    /// simulation loop. In-flight LLM and sandbox calls finish first.
    pub fn cancel_run(&self, run_id: &Uuid) -> Result<()> {
        self.state.runs.transition(run_id, RunStatus::Cancelled)?;
        self.state.cancels.cancel(run_id);
        Ok(())
    }

    async fn run_single_conversation(
        &self,
        run_id: &Uuid,
        sequence_num: u32,
        initial_message: Option<String>,
        cancel: &CancelToken,
    ) {
        // Reload so a mid-run rubric/status change is visible.
        let Some(run) = self.state.runs.get(run_id) else {
            return;
        };
        let env = run.scenario.constraints.clone();

        let record = ConversationRecord::new(*run_id, sequence_num);
        let conversation_id = self.state.conversations.insert(record.clone());

        let orchestrator = ConversationOrchestrator::new(
            self.state.llm.clone(),
            run.agent.clone(),
            UserSimulator::new(
                self.state.llm.clone(),
                run.scenario.user_persona.clone(),
                initial_message,
            ),
            ToolSandbox::new(env.clone(), Default::default()),
            AdversarialInjector::from_environment(&env),
            env,
            cancel.clone(),
        );

        let result = orchestrator.run().await;

        let mut record = record;
        record.apply_result(result);
        let event_status = if record.status.is_successful() {
            "completed"
        } else {
            "failed"
        };
        self.state.conversations.update(record.clone());

        tracing::info!(
            conversation_id = %conversation_id,
            sequence_num,
            turns = record.turn_count,
            status = record.status.as_str(),
            "conversation committed"
        );

        // Best-effort event; a publish failure never fails the run.
        let event = ConversationCompletedEvent::new(
            *run_id,
            conversation_id,
            record.turn_count,
            record.total_tokens,
            record.total_latency_ms,
            event_status,
        );
        if let Err(e) = self.state.producer.produce(
            topics::CONVERSATION_COMPLETED,
            &event.to_envelope(),
            Some(&conversation_id.to_string()),
        ) {
            tracing::warn!(conversation_id = %conversation_id, error = %e, "completion event failed");
        }

        if record.status == ConversationStatus::Failed {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = record.error_message.as_deref().unwrap_or(""),
                "conversation failed"
            );
        }
    }
}
