//! The three concrete pipeline consumers.
//!
//! `agent.conversation.completed` → evaluate the conversation;
//! `evaluation.score.completed` → aggregate run metrics once every
//! conversation is evaluated; `metrics.aggregated` → mark the run
//! completed.

use std::sync::Arc;

use cq_domain::error::{Error, Result};
use cq_domain::run::RunStatus;
use cq_eval::stats::aggregate::aggregate_metric_values;
use cq_pipeline::{
    topics, Consumer, ConsumerConfig, ConsumerHandle, EventEnvelope, EventHandler,
    MetricsAggregatedEvent,
};
use uuid::Uuid;

use crate::evaluation::EvaluationService;
use crate::state::SharedState;

fn payload_uuid(envelope: &EventEnvelope, field: &str) -> Result<Uuid> {
    let raw = envelope
        .payload_str(field)
        .ok_or_else(|| Error::Pipeline(format!("payload missing {field}")))?;
    Uuid::parse_str(raw).map_err(|e| Error::Pipeline(format!("bad {field}: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// conversation.completed → evaluation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ConversationCompletedHandler {
    state: SharedState,
}

#[async_trait::async_trait]
impl EventHandler for ConversationCompletedHandler {
    async fn handle_event(&self, envelope: &EventEnvelope) -> Result<()> {
        let conversation_id = payload_uuid(envelope, "conversation_id")?;
        let status = envelope.payload_str("status").unwrap_or("");

        if status != "completed" {
            tracing::debug!(conversation_id = %conversation_id, status, "conversation skipped");
            return Ok(());
        }

        tracing::info!(conversation_id = %conversation_id, "conversation event received");
        let rubric_id = self
            .state
            .conversations
            .get(&conversation_id)
            .and_then(|c| self.state.runs.get(&c.eval_run_id))
            .and_then(|r| r.rubric_id);

        EvaluationService::new(self.state.clone())
            .evaluate_conversation(conversation_id, rubric_id)
            .await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// evaluation.score.completed → aggregation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EvaluationCompletedHandler {
    state: SharedState,
}

#[async_trait::async_trait]
impl EventHandler for EvaluationCompletedHandler {
    async fn handle_event(&self, envelope: &EventEnvelope) -> Result<()> {
        let run_id = payload_uuid(envelope, "eval_run_id")?;

        let conversation_ids = self.state.conversations.successful_ids(&run_id);
        let total = conversation_ids.len();
        let evaluated = self.state.evaluations.count_evaluated(&conversation_ids);

        if total == 0 || evaluated < total {
            tracing::debug!(
                run_id = %run_id,
                evaluated,
                total,
                "evaluation incomplete"
            );
            return Ok(());
        }

        tracing::info!(run_id = %run_id, conversation_count = total, "aggregating metrics");

        for (name, values) in self.state.metrics.values_by_name(&conversation_ids) {
            let agg = aggregate_metric_values(&name, &values);
            let event = MetricsAggregatedEvent::new(
                run_id,
                agg.metric_name,
                agg.mean,
                agg.median,
                agg.std_dev,
                agg.min_val,
                agg.max_val,
                agg.sample_count,
            );
            if let Err(e) = self.state.producer.produce(
                topics::METRICS_AGGREGATED,
                &event.to_envelope(),
                Some(&run_id.to_string()),
            ) {
                tracing::error!(run_id = %run_id, error = %e, "aggregated event failed");
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// metrics.aggregated → run completion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MetricsAggregatedHandler {
    state: SharedState,
}

#[async_trait::async_trait]
impl EventHandler for MetricsAggregatedHandler {
    async fn handle_event(&self, envelope: &EventEnvelope) -> Result<()> {
        let run_id = payload_uuid(envelope, "eval_run_id")?;

        match self.state.runs.status(&run_id) {
            None => {
                tracing::warn!(run_id = %run_id, "eval run not found");
                Ok(())
            }
            Some(RunStatus::Completed) => Ok(()),
            Some(RunStatus::RunningEvaluation) => {
                self.state.runs.transition(&run_id, RunStatus::Completed)?;
                tracing::info!(run_id = %run_id, "eval run completed");
                Ok(())
            }
            Some(status) => {
                // Aggregation raced ahead of the run's own state machine
                // (simulation still in flight); a later event finishes it.
                tracing::debug!(
                    run_id = %run_id,
                    status = status.as_str(),
                    "run not ready for completion"
                );
                Ok(())
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bootstrap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start the three consumers on their own workers. Stop them with
/// [`ConsumerHandle::stop`].
pub fn spawn_consumers(state: &SharedState) -> Vec<ConsumerHandle> {
    let group = state.config.pipeline.consumer_group.clone();
    let max_retries = state.config.pipeline.max_retries;
    let config = |topic: &str| ConsumerConfig {
        topic: topic.to_string(),
        group: group.clone(),
        max_retries,
    };

    vec![
        Consumer::spawn(
            &state.broker,
            state.producer.clone(),
            config(topics::CONVERSATION_COMPLETED),
            Arc::new(ConversationCompletedHandler {
                state: state.clone(),
            }),
        ),
        Consumer::spawn(
            &state.broker,
            state.producer.clone(),
            config(topics::EVALUATION_SCORE_COMPLETED),
            Arc::new(EvaluationCompletedHandler {
                state: state.clone(),
            }),
        ),
        Consumer::spawn(
            &state.broker,
            state.producer.clone(),
            config(topics::METRICS_AGGREGATED),
            Arc::new(MetricsAggregatedHandler {
                state: state.clone(),
            }),
        ),
    ]
}
