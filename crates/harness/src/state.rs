//! Shared state handed to the services and consumers.

use std::path::Path;
use std::sync::Arc;

use cq_domain::config::Config;
use cq_engine::CancelMap;
use cq_pipeline::{EventProducer, MessageBroker};
use cq_providers::LlmClient;

use crate::stores::{ConversationStore, EvaluationStore, MetricStore, RubricStore, RunStore};

/// Everything the services need, cheap to clone.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmClient>,
    pub broker: Arc<MessageBroker>,
    pub producer: Arc<EventProducer>,

    // ── Stores ────────────────────────────────────────────────────
    pub runs: Arc<RunStore>,
    pub conversations: Arc<ConversationStore>,
    pub evaluations: Arc<EvaluationStore>,
    pub metrics: Arc<MetricStore>,
    pub rubrics: Arc<RubricStore>,

    // ── Runtime ───────────────────────────────────────────────────
    pub cancels: Arc<CancelMap>,
}

impl SharedState {
    /// Build state over a state directory, wiring the stores and an
    /// explicit (non-global) producer onto the given broker.
    pub fn new(
        config: Arc<Config>,
        llm: Arc<dyn LlmClient>,
        broker: Arc<MessageBroker>,
        producer: Arc<EventProducer>,
        state_path: &Path,
    ) -> Self {
        Self {
            config,
            llm,
            producer,
            runs: Arc::new(RunStore::new(state_path)),
            conversations: Arc::new(ConversationStore::new(state_path)),
            evaluations: Arc::new(EvaluationStore::new(state_path)),
            metrics: Arc::new(MetricStore::new(state_path)),
            rubrics: Arc::new(RubricStore::new(state_path)),
            cancels: Arc::new(CancelMap::new()),
            broker,
        }
    }
}
