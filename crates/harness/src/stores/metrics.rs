//! Metric store. One value per (conversation, metric name); re-inserting
//! the same key replaces the prior value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cq_domain::eval::MetricValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{append_jsonl, load_jsonl};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub conversation_id: Uuid,
    pub name: String,
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

pub struct MetricStore {
    log_path: PathBuf,
    /// (conversation, name) → record.
    metrics: RwLock<HashMap<(Uuid, String), MetricRecord>>,
}

impl MetricStore {
    pub fn new(state_path: &Path) -> Self {
        let log_path = state_path.join("metrics.jsonl");
        let mut metrics = HashMap::new();
        for record in load_jsonl::<MetricRecord>(&log_path) {
            metrics.insert((record.conversation_id, record.name.clone()), record);
        }
        Self {
            log_path,
            metrics: RwLock::new(metrics),
        }
    }

    pub fn insert(&self, conversation_id: Uuid, value: MetricValue) {
        let record = MetricRecord {
            conversation_id,
            name: value.name,
            value: value.value,
            unit: value.unit,
            metadata: value.metadata,
        };
        append_jsonl(&self.log_path, &record);
        self.metrics
            .write()
            .insert((conversation_id, record.name.clone()), record);
    }

    pub fn get(&self, conversation_id: &Uuid, name: &str) -> Option<MetricRecord> {
        self.metrics
            .read()
            .get(&(*conversation_id, name.to_string()))
            .cloned()
    }

    pub fn by_conversation(&self, conversation_id: &Uuid) -> Vec<MetricRecord> {
        self.metrics
            .read()
            .values()
            .filter(|m| m.conversation_id == *conversation_id)
            .cloned()
            .collect()
    }

    /// Metric values across the given conversations, grouped by name.
    /// Sorted name keys keep aggregation output stable.
    pub fn values_by_name(
        &self,
        conversation_ids: &[Uuid],
    ) -> std::collections::BTreeMap<String, Vec<f64>> {
        let mut groups: std::collections::BTreeMap<String, Vec<f64>> = Default::default();
        let metrics = self.metrics.read();
        for conv_id in conversation_ids {
            for record in metrics.values().filter(|m| m.conversation_id == *conv_id) {
                groups.entry(record.name.clone()).or_default().push(record.value);
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_per_conversation_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricStore::new(dir.path());
        let conv = Uuid::new_v4();

        store.insert(conv, MetricValue::new("tokens_per_turn", 10.0, "tokens"));
        store.insert(conv, MetricValue::new("tokens_per_turn", 12.0, "tokens"));

        // The second insert replaced the first.
        assert_eq!(store.by_conversation(&conv).len(), 1);
        assert_eq!(store.get(&conv, "tokens_per_turn").unwrap().value, 12.0);
    }

    #[test]
    fn values_grouped_by_name_across_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricStore::new(dir.path());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.insert(a, MetricValue::new("avg_latency_ms", 100.0, "ms"));
        store.insert(b, MetricValue::new("avg_latency_ms", 200.0, "ms"));
        store.insert(a, MetricValue::new("tool_call_count", 1.0, "count"));

        let groups = store.values_by_name(&[a, b]);
        let mut latencies = groups["avg_latency_ms"].clone();
        latencies.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(latencies, vec![100.0, 200.0]);
        assert_eq!(groups["tool_call_count"], vec![1.0]);
    }

    #[test]
    fn reload_applies_replacements() {
        let dir = tempfile::tempdir().unwrap();
        let conv = Uuid::new_v4();
        {
            let store = MetricStore::new(dir.path());
            store.insert(conv, MetricValue::new("x", 1.0, "count"));
            store.insert(conv, MetricValue::new("x", 2.0, "count"));
        }
        let reloaded = MetricStore::new(dir.path());
        assert_eq!(reloaded.get(&conv, "x").unwrap().value, 2.0);
    }
}
