//! Evaluation service: run every applicable evaluator on a conversation
//! and commit the results.
//!
//! Mirrors the simulation service's shape: load → evaluate → store →
//! emit. A single evaluator failing is logged and skipped; the others
//! still run. Events are emitted best-effort after the stores commit.

use std::sync::Arc;

use cq_domain::error::{Error, Result};
use cq_domain::rubric::{default_dimensions, RubricDimension};
use cq_domain::turn::Turn;
use cq_eval::{
    compute_automated_metrics, Evaluator, ModelJudgeEvaluator, ReferenceEvaluator,
    RubricGraderEvaluator, TrajectoryEvaluator,
};
use cq_pipeline::{topics, EvaluationScoreCompletedEvent};
use uuid::Uuid;

use crate::state::SharedState;
use crate::stores::EvaluationRecord;

pub struct EvaluationService {
    state: SharedState,
}

impl EvaluationService {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run all evaluators on one conversation. Returns the ids of the
    /// stored evaluations.
    pub async fn evaluate_conversation(
        &self,
        conversation_id: Uuid,
        rubric_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>> {
        let conversation = self
            .state
            .conversations
            .get(&conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
        let run = self
            .state
            .runs
            .get(&conversation.eval_run_id)
            .ok_or_else(|| Error::NotFound(format!("eval run {}", conversation.eval_run_id)))?;

        let dimensions = self.load_dimensions(rubric_id);
        let turns = &conversation.turns;
        let mut stored: Vec<Uuid> = Vec::new();

        // ── Model judge ────────────────────────────────────────────
        let judge = ModelJudgeEvaluator::new(
            self.state.llm.clone(),
            self.state.config.llm.judge_model.clone(),
        );
        self.run_evaluator(&judge, "model_judge", turns, &dimensions, conversation_id, rubric_id, &mut stored)
            .await;

        // ── Rubric grader ──────────────────────────────────────────
        let grader = RubricGraderEvaluator::new();
        self.run_evaluator(&grader, "rubric_grader", turns, &dimensions, conversation_id, rubric_id, &mut stored)
            .await;

        // ── Reference evaluator (only with gold answers) ───────────
        if run.scenario.has_reference_answers() {
            let enriched = enrich_with_references(turns, &run.scenario.turns_template);
            let reference = ReferenceEvaluator::new();
            self.run_evaluator(
                &reference,
                "reference_based",
                &enriched,
                &dimensions,
                conversation_id,
                rubric_id,
                &mut stored,
            )
            .await;
        }

        // ── Trajectory evaluator (only with an expected sequence) ──
        if run.scenario.has_expected_trajectory() {
            let trajectory = TrajectoryEvaluator::new(run.scenario.expected_tool_sequence.clone());
            self.run_evaluator(
                &trajectory,
                "trajectory",
                turns,
                &dimensions,
                conversation_id,
                rubric_id,
                &mut stored,
            )
            .await;
        }

        // ── Automated metrics ──────────────────────────────────────
        let metric_values = compute_automated_metrics(&conversation.as_result());
        let metric_count = metric_values.len();
        for value in metric_values {
            self.state.metrics.insert(conversation_id, value);
        }
        tracing::info!(
            conversation_id = %conversation_id,
            metric_count,
            "automated metrics committed"
        );

        // ── Emit one score event per stored evaluation ─────────────
        for evaluation_id in &stored {
            let Some(record) = self.state.evaluations.get(evaluation_id) else {
                continue;
            };
            let event = EvaluationScoreCompletedEvent::new(
                conversation.eval_run_id,
                conversation_id,
                *evaluation_id,
                record.evaluator_type.as_str(),
                record.overall_score,
                record.scores.clone(),
            );
            if let Err(e) = self.state.producer.produce(
                topics::EVALUATION_SCORE_COMPLETED,
                &event.to_envelope(),
                Some(&conversation_id.to_string()),
            ) {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "score event failed");
            }
        }

        Ok(stored)
    }

    /// Fan-out: evaluate every successful conversation in a run.
    pub async fn evaluate_all(&self, run_id: Uuid, rubric_id: Option<Uuid>) -> Result<usize> {
        let conversation_ids = self.state.conversations.successful_ids(&run_id);
        let count = conversation_ids.len();
        for conversation_id in conversation_ids {
            if let Err(e) = self.evaluate_conversation(conversation_id, rubric_id).await {
                tracing::error!(conversation_id = %conversation_id, error = %e, "evaluation failed");
            }
        }
        tracing::info!(run_id = %run_id, count, "run evaluation dispatched");
        Ok(count)
    }

    fn load_dimensions(&self, rubric_id: Option<Uuid>) -> Vec<RubricDimension> {
        rubric_id
            .and_then(|id| self.state.rubrics.get(&id))
            .map(|rubric| rubric.dimensions)
            .filter(|dims| !dims.is_empty())
            .unwrap_or_else(default_dimensions)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_evaluator(
        &self,
        evaluator: &dyn Evaluator,
        label: &str,
        turns: &[Turn],
        dimensions: &[RubricDimension],
        conversation_id: Uuid,
        rubric_id: Option<Uuid>,
        stored: &mut Vec<Uuid>,
    ) {
        match evaluator.evaluate(turns, dimensions).await {
            Ok(result) => {
                let overall = result.overall_score;
                let record = EvaluationRecord::from_result(conversation_id, rubric_id, result);
                stored.push(self.state.evaluations.insert(record));
                tracing::info!(
                    conversation_id = %conversation_id,
                    evaluator = label,
                    overall_score = overall,
                    "evaluation committed"
                );
            }
            Err(e) => {
                tracing::error!(
                    conversation_id = %conversation_id,
                    evaluator = label,
                    error = %e,
                    "evaluator failed"
                );
            }
        }
    }
}

/// Copy `expected_response` from the scenario template onto the actual
/// turns by index.
fn enrich_with_references(turns: &[Turn], template: &[cq_domain::scenario::TurnTemplate]) -> Vec<Turn> {
    turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            let mut turn = turn.clone();
            if let Some(expected) = template.get(i).and_then(|t| t.expected_response.clone()) {
                turn.expected_response = Some(expected);
            }
            turn
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::config::Config;
    use cq_domain::environment::SimulationEnvironment;
    use cq_domain::eval::EvaluatorType;
    use cq_domain::persona::{AgentPersona, UserPersona};
    use cq_domain::run::EvalRun;
    use cq_domain::scenario::{Scenario, TurnTemplate};
    use cq_domain::turn::{ConversationResult, ConversationStatus};
    use cq_pipeline::{EventEnvelope, EventProducer, MessageBroker};
    use cq_providers::ScriptedLlmClient;
    use std::time::Duration;

    use crate::stores::ConversationRecord;

    fn scenario(with_reference: bool, with_trajectory: bool) -> Scenario {
        Scenario {
            id: Uuid::new_v4(),
            name: "s".into(),
            user_persona: UserPersona {
                personality: "n".into(),
                expertise_level: "i".into(),
                goal: "g".into(),
                model: "m".into(),
            },
            turns_template: vec![TurnTemplate {
                content: "q".into(),
                expected_response: with_reference.then(|| "the answer".to_string()),
            }],
            constraints: SimulationEnvironment::default(),
            expected_tool_sequence: if with_trajectory {
                vec!["get_weather".into()]
            } else {
                Vec::new()
            },
        }
    }

    fn setup(
        with_reference: bool,
        with_trajectory: bool,
    ) -> (tempfile::TempDir, SharedState, Arc<ScriptedLlmClient>, Uuid, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlmClient::new());
        let broker = Arc::new(MessageBroker::new());
        let producer = Arc::new(EventProducer::new(broker.clone()));
        let state = SharedState::new(
            Arc::new(Config::default()),
            llm.clone(),
            broker,
            producer,
            dir.path(),
        );
        let run = EvalRun::new(
            AgentPersona {
                name: "a".into(),
                system_prompt: "p".into(),
                model: "m".into(),
                temperature: 0.7,
                max_tokens: 100,
                tools: Vec::new(),
            },
            scenario(with_reference, with_trajectory),
            1,
        );
        let run_id = state.runs.insert(run);

        let mut record = ConversationRecord::new(run_id, 0);
        let mut result = ConversationResult::empty();
        result.turns = vec![Turn::user("q"), Turn::assistant("the answer", 10, 20, 10)];
        result.turn_count = 1;
        result.total_input_tokens = 20;
        result.total_output_tokens = 10;
        result.total_tokens = 30;
        result.total_latency_ms = 10;
        result.status = ConversationStatus::Completed;
        record.apply_result(result);
        let conversation_id = state.conversations.insert(record);

        (dir, state, llm, run_id, conversation_id)
    }

    #[tokio::test]
    async fn judge_and_grader_always_run() {
        let (_dir, state, llm, _run_id, conversation_id) = setup(false, false);
        // Judge gets an unparseable text response → default scores.
        llm.push_text("fine", 1, 1);

        let stored = EvaluationService::new(state.clone())
            .evaluate_conversation(conversation_id, None)
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        let evals = state.evaluations.by_conversation(&conversation_id);
        let types: Vec<EvaluatorType> = evals.iter().map(|e| e.evaluator_type).collect();
        assert!(types.contains(&EvaluatorType::ModelJudge));
        assert!(types.contains(&EvaluatorType::RubricGrader));

        // Automated metrics landed too.
        assert!(state.metrics.get(&conversation_id, "tokens_per_turn").is_some());
        assert_eq!(
            state
                .metrics
                .get(&conversation_id, "tool_success_rate")
                .unwrap()
                .value,
            1.0
        );
    }

    #[tokio::test]
    async fn judge_failure_does_not_block_grader() {
        let (_dir, state, _llm, _run_id, conversation_id) = setup(false, false);
        // No scripted response: the judge call errors, the grader runs.

        let stored = EvaluationService::new(state.clone())
            .evaluate_conversation(conversation_id, None)
            .await
            .unwrap();

        assert_eq!(stored.len(), 1);
        let evals = state.evaluations.by_conversation(&conversation_id);
        assert_eq!(evals[0].evaluator_type, EvaluatorType::RubricGrader);
    }

    #[tokio::test]
    async fn reference_and_trajectory_run_when_scenario_defines_them() {
        let (_dir, state, llm, _run_id, conversation_id) = setup(true, true);
        llm.push_text("fine", 1, 1); // judge fallback

        let stored = EvaluationService::new(state.clone())
            .evaluate_conversation(conversation_id, None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 4);

        let evals = state.evaluations.by_conversation(&conversation_id);
        let reference = evals
            .iter()
            .find(|e| e.evaluator_type == EvaluatorType::ReferenceBased)
            .unwrap();
        // Template index 0 pairs "the answer" with the assistant turn.
        assert_eq!(reference.scores["exact_match"], 1.0);
        assert_eq!(reference.overall_score, 10.0);

        let trajectory = evals
            .iter()
            .find(|e| e.evaluator_type == EvaluatorType::Trajectory)
            .unwrap();
        // No tools were called but one was expected.
        assert_eq!(trajectory.overall_score, 0.0);
    }

    #[tokio::test]
    async fn emits_score_events_keyed_by_conversation() {
        let (_dir, state, llm, run_id, conversation_id) = setup(false, false);
        llm.push_text("fine", 1, 1);
        let mut events = state
            .broker
            .subscribe(topics::EVALUATION_SCORE_COMPLETED, "test");

        EvaluationService::new(state.clone())
            .evaluate_conversation(conversation_id, None)
            .await
            .unwrap();

        let msg = events.poll(Duration::from_millis(200)).await.unwrap();
        assert_eq!(msg.key.as_deref(), Some(conversation_id.to_string().as_str()));
        let envelope = EventEnvelope::decode(&msg.value).unwrap();
        assert_eq!(envelope.payload["eval_run_id"], run_id.to_string());
        assert!(envelope.payload["dimension_scores"].is_object());
        // Second evaluator's event follows.
        assert!(events.poll(Duration::from_millis(200)).await.is_some());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (_dir, state, _llm, _run_id, _conv) = setup(false, false);
        let err = EvaluationService::new(state)
            .evaluate_conversation(Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn evaluate_all_covers_successful_conversations() {
        let (_dir, state, llm, run_id, _conv) = setup(false, false);
        llm.push_text("fine", 1, 1);

        // Add a failed conversation that must be skipped.
        let mut failed = ConversationRecord::new(run_id, 1);
        failed.status = ConversationStatus::Failed;
        state.conversations.insert(failed);

        let count = EvaluationService::new(state)
            .evaluate_all(run_id, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
