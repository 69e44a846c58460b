//! Event producer.
//!
//! A thin, thread-safe wrapper over the broker, with a process-wide
//! singleton for the common case. Publishing is best-effort for
//! callers: delivery failures are logged at error level and must never
//! fail the caller's primary work.

use std::sync::Arc;
use std::time::Duration;

use cq_domain::error::{Error, Result};
use parking_lot::Mutex;

use crate::broker::MessageBroker;
use crate::envelope::EventEnvelope;

static GLOBAL: Mutex<Option<Arc<EventProducer>>> = Mutex::new(None);

pub struct EventProducer {
    broker: Arc<MessageBroker>,
}

impl EventProducer {
    pub fn new(broker: Arc<MessageBroker>) -> Self {
        Self { broker }
    }

    /// Initialize the process-wide producer. The first caller wins;
    /// later calls return the existing instance.
    pub fn initialize(broker: Arc<MessageBroker>) -> Arc<EventProducer> {
        let mut global = GLOBAL.lock();
        if let Some(existing) = global.as_ref() {
            return existing.clone();
        }
        let producer = Arc::new(EventProducer::new(broker));
        *global = Some(producer.clone());
        tracing::info!("event producer initialized");
        producer
    }

    /// The process-wide producer, if initialized.
    pub fn global() -> Result<Arc<EventProducer>> {
        GLOBAL
            .lock()
            .clone()
            .ok_or_else(|| Error::Pipeline("event producer not initialized".into()))
    }

    /// Reset the singleton. Test-only.
    pub fn reset() {
        *GLOBAL.lock() = None;
    }

    /// Serialize and publish an envelope. Keyed events for the same key
    /// are delivered in publication order.
    pub fn produce(&self, topic: &str, envelope: &EventEnvelope, key: Option<&str>) -> Result<()> {
        let data = match envelope.encode() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(topic, error = %e, "event serialization failed");
                return Err(e);
            }
        };

        let delivered = self.broker.publish(topic, key, data);
        tracing::debug!(topic, key = key.unwrap_or(""), delivered, "event produced");
        Ok(())
    }

    /// Flush pending messages, returning how many are still queued.
    /// The in-process broker delivers synchronously, so this is always 0;
    /// the method exists so call sites keep the produce/flush shape.
    pub fn flush(&self, _timeout: Duration) -> usize {
        0
    }
}
