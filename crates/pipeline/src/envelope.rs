//! Versioned event envelope and the typed events that travel in it.
//!
//! On the wire an envelope is UTF-8 JSON:
//! `{"version":1,"event_type":"<string>","payload":{...}}`. Every
//! payload carries at least `event_id` (a UUIDv7, so lexicographic
//! order approximates creation order) and an ISO-8601 UTC `timestamp`.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use cq_domain::error::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::topics;

pub const ENVELOPE_VERSION: u32 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub version: u32,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// The payload's `event_id`, when present.
    pub fn event_id(&self) -> Option<&str> {
        self.payload.get("event_id").and_then(|v| v.as_str())
    }

    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|v| v.as_str())
    }
}

fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Emitted when a simulated conversation finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationCompletedEvent {
    pub event_id: String,
    pub timestamp: String,
    pub eval_run_id: String,
    pub conversation_id: String,
    pub turn_count: u32,
    pub total_tokens: u64,
    pub total_latency_ms: u64,
    /// "completed" | "failed"
    pub status: String,
}

impl ConversationCompletedEvent {
    pub fn new(
        eval_run_id: Uuid,
        conversation_id: Uuid,
        turn_count: u32,
        total_tokens: u64,
        total_latency_ms: u64,
        status: impl Into<String>,
    ) -> Self {
        Self {
            event_id: new_event_id(),
            timestamp: now_timestamp(),
            eval_run_id: eval_run_id.to_string(),
            conversation_id: conversation_id.to_string(),
            turn_count,
            total_tokens,
            total_latency_ms,
            status: status.into(),
        }
    }

    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope::new(
            topics::CONVERSATION_COMPLETED,
            serde_json::to_value(self).expect("event serializes"),
        )
    }
}

/// Emitted when one evaluator finishes scoring one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationScoreCompletedEvent {
    pub event_id: String,
    pub timestamp: String,
    pub eval_run_id: String,
    pub conversation_id: String,
    pub evaluation_id: String,
    pub evaluator_type: String,
    pub overall_score: f64,
    pub dimension_scores: BTreeMap<String, f64>,
}

impl EvaluationScoreCompletedEvent {
    pub fn new(
        eval_run_id: Uuid,
        conversation_id: Uuid,
        evaluation_id: Uuid,
        evaluator_type: impl Into<String>,
        overall_score: f64,
        dimension_scores: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            event_id: new_event_id(),
            timestamp: now_timestamp(),
            eval_run_id: eval_run_id.to_string(),
            conversation_id: conversation_id.to_string(),
            evaluation_id: evaluation_id.to_string(),
            evaluator_type: evaluator_type.into(),
            overall_score,
            dimension_scores,
        }
    }

    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope::new(
            topics::EVALUATION_SCORE_COMPLETED,
            serde_json::to_value(self).expect("event serializes"),
        )
    }
}

/// Emitted once per metric name when a run's metrics are aggregated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsAggregatedEvent {
    pub event_id: String,
    pub timestamp: String,
    pub eval_run_id: String,
    pub metric_name: String,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min_val: f64,
    pub max_val: f64,
    pub sample_count: usize,
}

impl MetricsAggregatedEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eval_run_id: Uuid,
        metric_name: impl Into<String>,
        mean: f64,
        median: f64,
        std_dev: f64,
        min_val: f64,
        max_val: f64,
        sample_count: usize,
    ) -> Self {
        Self {
            event_id: new_event_id(),
            timestamp: now_timestamp(),
            eval_run_id: eval_run_id.to_string(),
            metric_name: metric_name.into(),
            mean,
            median,
            std_dev,
            min_val,
            max_val,
            sample_count,
        }
    }

    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope::new(
            topics::METRICS_AGGREGATED,
            serde_json::to_value(self).expect("event serializes"),
        )
    }
}

/// Wrapper for messages that exhausted their retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEvent {
    pub original_topic: String,
    pub error: String,
    pub original_value: String,
}

impl DeadLetterEvent {
    pub fn to_envelope(&self) -> EventEnvelope {
        EventEnvelope::new(
            "pipeline.dead_letter",
            serde_json::to_value(self).expect("event serializes"),
        )
    }
}
