//! In-process message broker.
//!
//! Backs the producer/consumer machinery with per-topic, per-group
//! channels. A published message fans out to every subscribed group;
//! within one group a single subscription receives all messages in
//! publication order, which also gives per-key ordering. Topics with no
//! subscribers drop messages (there is no retention).

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub key: Option<String>,
    /// Serialized envelope (UTF-8 JSON).
    pub value: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MessageBroker {
    /// topic → group → sender.
    channels: Mutex<HashMap<String, HashMap<String, mpsc::UnboundedSender<BrokerMessage>>>>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a consumer group to a topic. One subscription per
    /// (topic, group); subscribing again replaces the previous receiver.
    pub fn subscribe(&self, topic: &str, group: &str) -> BrokerSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock();
        let groups = channels.entry(topic.to_string()).or_default();
        if groups.insert(group.to_string(), tx).is_some() {
            tracing::warn!(topic, group, "replacing existing subscription");
        }
        tracing::debug!(topic, group, "consumer subscribed");
        BrokerSubscription {
            topic: topic.to_string(),
            group: group.to_string(),
            rx,
        }
    }

    /// Publish a message to every group subscribed to `topic`. Returns
    /// the number of groups that received it.
    pub fn publish(&self, topic: &str, key: Option<&str>, value: String) -> usize {
        let message = BrokerMessage {
            topic: topic.to_string(),
            key: key.map(String::from),
            value,
        };

        let mut channels = self.channels.lock();
        let Some(groups) = channels.get_mut(topic) else {
            tracing::debug!(topic, "no subscribers; message dropped");
            return 0;
        };

        let mut delivered = 0;
        // Drop senders whose receiver side is gone.
        groups.retain(|group, tx| match tx.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(topic, group, "dropping closed subscription");
                false
            }
        });
        delivered
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscription
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BrokerSubscription {
    pub topic: String,
    pub group: String,
    rx: mpsc::UnboundedReceiver<BrokerMessage>,
}

impl BrokerSubscription {
    /// Wait up to `timeout` for the next message.
    pub async fn poll(&mut self, timeout: Duration) -> Option<BrokerMessage> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }
}
