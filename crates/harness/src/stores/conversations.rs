//! Conversation store: full turn sequences plus aggregates, immutable
//! once a conversation reaches a terminal status.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cq_domain::turn::{ConversationResult, ConversationStatus, Turn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{append_jsonl, load_jsonl};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub eval_run_id: Uuid,
    pub sequence_num: u32,
    pub status: ConversationStatus,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
    #[serde(default)]
    pub total_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    pub fn new(eval_run_id: Uuid, sequence_num: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            eval_run_id,
            sequence_num,
            status: ConversationStatus::Running,
            turns: Vec::new(),
            turn_count: 0,
            total_tokens: 0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_latency_ms: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Absorb an engine result into this record.
    pub fn apply_result(&mut self, result: ConversationResult) {
        self.turn_count = result.turn_count;
        self.total_tokens = result.total_tokens;
        self.total_input_tokens = result.total_input_tokens;
        self.total_output_tokens = result.total_output_tokens;
        self.total_latency_ms = result.total_latency_ms;
        self.status = result.status;
        self.error_message = result.error_message;
        self.turns = result.turns;
        self.completed_at = Some(Utc::now());
    }

    /// View the stored turns as an engine-shaped result (used by the
    /// automated metrics calculator).
    pub fn as_result(&self) -> ConversationResult {
        ConversationResult {
            turns: self.turns.clone(),
            turn_count: self.turn_count,
            total_tokens: self.total_tokens,
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_latency_ms: self.total_latency_ms,
            status: self.status,
            error_message: self.error_message.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ConversationStore {
    log_path: PathBuf,
    conversations: RwLock<HashMap<Uuid, ConversationRecord>>,
}

impl ConversationStore {
    pub fn new(state_path: &Path) -> Self {
        let log_path = state_path.join("conversations.jsonl");
        let mut conversations = HashMap::new();
        for record in load_jsonl::<ConversationRecord>(&log_path) {
            conversations.insert(record.id, record);
        }
        Self {
            log_path,
            conversations: RwLock::new(conversations),
        }
    }

    pub fn insert(&self, record: ConversationRecord) -> Uuid {
        let id = record.id;
        append_jsonl(&self.log_path, &record);
        self.conversations.write().insert(id, record);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<ConversationRecord> {
        self.conversations.read().get(id).cloned()
    }

    /// Replace the stored record with its terminal snapshot.
    pub fn update(&self, record: ConversationRecord) {
        append_jsonl(&self.log_path, &record);
        self.conversations.write().insert(record.id, record);
    }

    pub fn by_run(&self, eval_run_id: &Uuid) -> Vec<ConversationRecord> {
        let mut records: Vec<ConversationRecord> = self
            .conversations
            .read()
            .values()
            .filter(|c| c.eval_run_id == *eval_run_id)
            .cloned()
            .collect();
        records.sort_by_key(|c| c.sequence_num);
        records
    }

    /// Ids of conversations in a run that ended in a successful terminal
    /// state (anything but `failed`).
    pub fn successful_ids(&self, eval_run_id: &Uuid) -> Vec<Uuid> {
        self.by_run(eval_run_id)
            .into_iter()
            .filter(|c| c.status.is_successful())
            .map(|c| c.id)
            .collect()
    }

    pub fn count_successful(&self, eval_run_id: &Uuid) -> usize {
        self.successful_ids(eval_run_id).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_update_and_query_by_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let run_id = Uuid::new_v4();

        let mut record = ConversationRecord::new(run_id, 0);
        let id = store.insert(record.clone());

        let mut result = ConversationResult::empty();
        result.turns.push(Turn::user("hi"));
        result.turn_count = 1;
        record.apply_result(result);
        store.update(record);

        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.status, ConversationStatus::Completed);
        assert_eq!(loaded.turn_count, 1);
        assert!(loaded.completed_at.is_some());

        assert_eq!(store.by_run(&run_id).len(), 1);
        assert_eq!(store.count_successful(&run_id), 1);
        assert_eq!(store.by_run(&Uuid::new_v4()).len(), 0);
    }

    #[test]
    fn failed_conversations_are_not_successful() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let run_id = Uuid::new_v4();

        let mut failed = ConversationRecord::new(run_id, 0);
        failed.status = ConversationStatus::Failed;
        store.insert(failed);

        let mut goal = ConversationRecord::new(run_id, 1);
        goal.status = ConversationStatus::GoalAchieved;
        store.insert(goal);

        assert_eq!(store.count_successful(&run_id), 1);
    }

    #[test]
    fn by_run_is_ordered_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let run_id = Uuid::new_v4();

        for seq in [2u32, 0, 1] {
            store.insert(ConversationRecord::new(run_id, seq));
        }
        let seqs: Vec<u32> = store.by_run(&run_id).iter().map(|c| c.sequence_num).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn reload_keeps_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let id = {
            let store = ConversationStore::new(dir.path());
            let mut record = ConversationRecord::new(run_id, 0);
            let id = store.insert(record.clone());
            record.apply_result(ConversationResult::empty());
            store.update(record);
            id
        };

        let reloaded = ConversationStore::new(dir.path());
        assert_eq!(
            reloaded.get(&id).unwrap().status,
            ConversationStatus::Completed
        );
    }
}
