//! Event pipeline: versioned envelopes over named topics, an idempotent
//! producer, and a consumer framework with retries, dedup, and a
//! dead-letter topic.
//!
//! Delivery is at-least-once with per-key ordering: all events published
//! with the same key reach a consumer group in publication order.
//! Consumers are responsible for idempotency, which the framework
//! provides through a bounded processed-id set.

mod broker;
mod consumer;
mod envelope;
mod producer;
pub mod topics;

pub use broker::{BrokerMessage, BrokerSubscription, MessageBroker};
pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, EventHandler, ProcessedIds, DEDUP_CAP};
pub use envelope::{
    ConversationCompletedEvent, DeadLetterEvent, EvaluationScoreCompletedEvent, EventEnvelope,
    MetricsAggregatedEvent, ENVELOPE_VERSION,
};
pub use producer::EventProducer;
