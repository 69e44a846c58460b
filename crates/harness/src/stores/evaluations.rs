//! Evaluation store.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cq_domain::eval::{EvaluationResult, EvaluatorType};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{append_jsonl, load_jsonl};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_id: Option<Uuid>,
    pub evaluator_type: EvaluatorType,
    pub scores: std::collections::BTreeMap<String, f64>,
    pub overall_score: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_turn_scores: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn from_result(
        conversation_id: Uuid,
        rubric_id: Option<Uuid>,
        result: EvaluationResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            rubric_id,
            evaluator_type: result.evaluator_type,
            scores: result.scores,
            overall_score: result.overall_score,
            reasoning: result.reasoning,
            per_turn_scores: result.per_turn_scores,
            metadata: result.metadata,
            created_at: Utc::now(),
        }
    }
}

pub struct EvaluationStore {
    log_path: PathBuf,
    evaluations: RwLock<HashMap<Uuid, EvaluationRecord>>,
}

impl EvaluationStore {
    pub fn new(state_path: &Path) -> Self {
        let log_path = state_path.join("evaluations.jsonl");
        let mut evaluations = HashMap::new();
        for record in load_jsonl::<EvaluationRecord>(&log_path) {
            evaluations.insert(record.id, record);
        }
        Self {
            log_path,
            evaluations: RwLock::new(evaluations),
        }
    }

    pub fn insert(&self, record: EvaluationRecord) -> Uuid {
        let id = record.id;
        append_jsonl(&self.log_path, &record);
        self.evaluations.write().insert(id, record);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<EvaluationRecord> {
        self.evaluations.read().get(id).cloned()
    }

    pub fn by_conversation(&self, conversation_id: &Uuid) -> Vec<EvaluationRecord> {
        self.evaluations
            .read()
            .values()
            .filter(|e| e.conversation_id == *conversation_id)
            .cloned()
            .collect()
    }

    /// How many of the given conversations have at least one evaluation.
    pub fn count_evaluated(&self, conversation_ids: &[Uuid]) -> usize {
        let wanted: HashSet<&Uuid> = conversation_ids.iter().collect();
        let evaluated: HashSet<Uuid> = self
            .evaluations
            .read()
            .values()
            .filter(|e| wanted.contains(&e.conversation_id))
            .map(|e| e.conversation_id)
            .collect();
        evaluated.len()
    }
}
