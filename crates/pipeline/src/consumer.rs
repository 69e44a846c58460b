//! Consumer framework: poll loop, idempotent consumption, bounded
//! retries with exponential backoff, and dead-lettering.
//!
//! Each consumer owns one topic and one group and runs on its own
//! long-lived task, processing one message at a time. The handler is
//! supplied by composition — a [`EventHandler`] implementation — rather
//! than inheritance.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cq_domain::error::Result;

use crate::broker::{BrokerMessage, MessageBroker};
use crate::envelope::{DeadLetterEvent, EventEnvelope};
use crate::producer::EventProducer;
use crate::topics::PIPELINE_ERRORS;

/// Hard cap on remembered event ids per consumer process.
pub const DEDUP_CAP: usize = 100_000;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_BACKOFF_SECS: u64 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-consumer event processing logic.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, envelope: &EventEnvelope) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Processed-id set
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bounded, insertion-ordered set of processed event ids.
///
/// On overflow the oldest half is evicted — deterministic within a
/// process, unlike the unordered-set eviction this replaces.
pub struct ProcessedIds {
    set: HashSet<String>,
    order: VecDeque<String>,
    cap: usize,
}

impl ProcessedIds {
    pub fn new() -> Self {
        Self::with_cap(DEDUP_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            set: HashSet::new(),
            order: VecDeque::new(),
            cap: cap.max(2),
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.set.contains(event_id)
    }

    pub fn insert(&mut self, event_id: &str) {
        if !self.set.insert(event_id.to_string()) {
            return;
        }
        self.order.push_back(event_id.to_string());

        if self.set.len() > self.cap {
            let evict = self.cap / 2;
            for _ in 0..evict {
                if let Some(old) = self.order.pop_front() {
                    self.set.remove(&old);
                }
            }
            tracing::debug!(evicted = evict, remaining = self.set.len(), "dedup set pruned");
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl Default for ProcessedIds {
    fn default() -> Self {
        Self::new()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Consumer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub topic: String,
    pub group: String,
    /// Handler attempts before the message is dead-lettered.
    pub max_retries: u32,
}

pub struct Consumer;

/// Handle to a spawned consumer worker.
pub struct ConsumerHandle {
    topic: String,
    running: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl ConsumerHandle {
    /// Signal shutdown and wait for the worker to drain its current
    /// message.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.task.await {
            tracing::warn!(topic = %self.topic, error = %e, "consumer task join failed");
        }
        tracing::info!(topic = %self.topic, "consumer stopped");
    }
}

impl Consumer {
    /// Subscribe and start consuming on a background task.
    pub fn spawn(
        broker: &MessageBroker,
        producer: Arc<EventProducer>,
        config: ConsumerConfig,
        handler: Arc<dyn EventHandler>,
    ) -> ConsumerHandle {
        let subscription = broker.subscribe(&config.topic, &config.group);
        let running = Arc::new(AtomicBool::new(true));
        let topic = config.topic.clone();

        tracing::info!(topic = %config.topic, group = %config.group, "consumer started");

        let loop_running = running.clone();
        let task = tokio::spawn(async move {
            let mut subscription = subscription;
            let mut processed = ProcessedIds::new();
            while loop_running.load(Ordering::Acquire) {
                let Some(msg) = subscription.poll(POLL_INTERVAL).await else {
                    continue;
                };
                Self::process_message(&producer, &config, handler.as_ref(), &mut processed, msg)
                    .await;
            }
        });

        ConsumerHandle {
            topic,
            running,
            task,
        }
    }

    /// Decode → dedup → retry loop → dead-letter. Exposed to tests so
    /// the retry path can be exercised without the poll loop.
    pub async fn process_message(
        producer: &EventProducer,
        config: &ConsumerConfig,
        handler: &dyn EventHandler,
        processed: &mut ProcessedIds,
        msg: BrokerMessage,
    ) {
        let envelope = match EventEnvelope::decode(&msg.value) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(topic = %config.topic, error = %e, "envelope decode failed");
                return;
            }
        };

        // Idempotency: skip already-processed events.
        let event_id = envelope.event_id().map(String::from);
        if let Some(id) = &event_id {
            if processed.contains(id) {
                tracing::debug!(topic = %config.topic, event_id = %id, "duplicate skipped");
                return;
            }
        }

        for attempt in 1..=config.max_retries {
            match handler.handle_event(&envelope).await {
                Ok(()) => {
                    if let Some(id) = &event_id {
                        processed.insert(id);
                    }
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        topic = %config.topic,
                        attempt,
                        max_retries = config.max_retries,
                        error = %e,
                        "handler failed"
                    );
                    if attempt < config.max_retries {
                        let backoff = 2u64.pow(attempt).min(MAX_BACKOFF_SECS);
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                    }
                }
            }
        }

        Self::dead_letter(producer, &config.topic, &msg, "Max retries exhausted");
    }

    fn dead_letter(producer: &EventProducer, topic: &str, msg: &BrokerMessage, error: &str) {
        let dlq = DeadLetterEvent {
            original_topic: topic.to_string(),
            error: error.to_string(),
            original_value: msg.value.clone(),
        };
        match producer.produce(PIPELINE_ERRORS, &dlq.to_envelope(), None) {
            Ok(()) => tracing::error!(topic, error, "message dead-lettered"),
            Err(e) => tracing::error!(topic, error = %e, "dead-letter publish failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CountingHandler {
        calls: Mutex<u32>,
        fail: bool,
    }

    impl CountingHandler {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
                fail,
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _envelope: &EventEnvelope) -> Result<()> {
            *self.calls.lock() += 1;
            if self.fail {
                Err(cq_domain::error::Error::Other("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn msg(event_id: &str) -> BrokerMessage {
        let envelope = EventEnvelope::new("t", serde_json::json!({"event_id": event_id}));
        BrokerMessage {
            topic: "t".into(),
            key: None,
            value: envelope.encode().unwrap(),
        }
    }

    fn config(max_retries: u32) -> ConsumerConfig {
        ConsumerConfig {
            topic: "t".into(),
            group: "g".into(),
            max_retries,
        }
    }

    // ── ProcessedIds ───────────────────────────────────────────────

    #[test]
    fn processed_ids_dedup() {
        let mut ids = ProcessedIds::new();
        assert!(ids.is_empty());
        ids.insert("a");
        ids.insert("a");
        assert!(ids.contains("a"));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn processed_ids_evicts_oldest_half() {
        let mut ids = ProcessedIds::with_cap(10);
        for i in 0..11 {
            ids.insert(&format!("id-{i}"));
        }
        // 11 > 10 → evict 5 oldest (id-0..id-4).
        assert_eq!(ids.len(), 6);
        assert!(!ids.contains("id-0"));
        assert!(!ids.contains("id-4"));
        assert!(ids.contains("id-5"));
        assert!(ids.contains("id-10"));
    }

    #[test]
    fn processed_ids_eviction_is_deterministic() {
        let run = || {
            let mut ids = ProcessedIds::with_cap(6);
            for i in 0..9 {
                ids.insert(&format!("id-{i}"));
            }
            let mut kept: Vec<String> =
                (0..9).map(|i| format!("id-{i}")).filter(|id| ids.contains(id)).collect();
            kept.sort();
            kept
        };
        assert_eq!(run(), run());
    }

    // ── Retry / DLQ ────────────────────────────────────────────────

    #[tokio::test]
    async fn success_marks_processed_and_dedups_replays() {
        let broker = Arc::new(MessageBroker::new());
        let producer = EventProducer::new(broker.clone());
        let handler = CountingHandler::new(false);
        let mut processed = ProcessedIds::new();

        for _ in 0..3 {
            Consumer::process_message(
                &producer,
                &config(3),
                handler.as_ref(),
                &mut processed,
                msg("dup-1"),
            )
            .await;
        }

        // Replays of the same event_id invoke the handler at most once.
        assert_eq!(handler.calls(), 1);
        assert!(processed.contains("dup-1"));
    }

    #[tokio::test]
    async fn failing_handler_retries_then_dead_letters() {
        // S5: always-raising handler, max_retries = 2.
        let broker = Arc::new(MessageBroker::new());
        let producer = EventProducer::new(broker.clone());
        let mut dlq = broker.subscribe(PIPELINE_ERRORS, "dlq-watch");
        let handler = CountingHandler::new(true);
        let mut processed = ProcessedIds::new();

        let original = msg("fail-1");
        Consumer::process_message(
            &producer,
            &config(2),
            handler.as_ref(),
            &mut processed,
            original.clone(),
        )
        .await;

        assert_eq!(handler.calls(), 2);
        assert!(!processed.contains("fail-1"));

        let dead = dlq.poll(Duration::from_millis(100)).await.unwrap();
        let envelope = EventEnvelope::decode(&dead.value).unwrap();
        assert_eq!(envelope.event_type, "pipeline.dead_letter");
        assert_eq!(envelope.payload["original_topic"], "t");
        assert_eq!(envelope.payload["error"], "Max retries exhausted");
        assert_eq!(envelope.payload["original_value"], original.value.as_str());
    }

    #[tokio::test]
    async fn undecodable_message_is_skipped() {
        let broker = Arc::new(MessageBroker::new());
        let producer = EventProducer::new(broker.clone());
        let handler = CountingHandler::new(false);
        let mut processed = ProcessedIds::new();

        Consumer::process_message(
            &producer,
            &config(3),
            handler.as_ref(),
            &mut processed,
            BrokerMessage {
                topic: "t".into(),
                key: None,
                value: "garbage{".into(),
            },
        )
        .await;
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn event_without_id_is_processed_every_time() {
        let broker = Arc::new(MessageBroker::new());
        let producer = EventProducer::new(broker.clone());
        let handler = CountingHandler::new(false);
        let mut processed = ProcessedIds::new();

        let envelope = EventEnvelope::new("t", serde_json::json!({"other": 1}));
        let message = BrokerMessage {
            topic: "t".into(),
            key: None,
            value: envelope.encode().unwrap(),
        };
        for _ in 0..2 {
            Consumer::process_message(
                &producer,
                &config(3),
                handler.as_ref(),
                &mut processed,
                message.clone(),
            )
            .await;
        }
        assert_eq!(handler.calls(), 2);
        assert!(processed.is_empty());
    }

    #[tokio::test]
    async fn spawned_consumer_processes_and_stops() {
        let broker = Arc::new(MessageBroker::new());
        let producer = Arc::new(EventProducer::new(broker.clone()));
        let handler = CountingHandler::new(false);

        let handle = Consumer::spawn(&broker, producer, config(3), handler.clone());

        let envelope = EventEnvelope::new("t", serde_json::json!({"event_id": "e1"}));
        broker.publish("t", None, envelope.encode().unwrap());

        // Wait for the worker to pick the message up.
        for _ in 0..50 {
            if handler.calls() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handler.calls(), 1);
        handle.stop().await;
    }
}
