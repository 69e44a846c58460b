//! Evaluation outputs: evaluator types, dimension scores, metric values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluator type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorType {
    ModelJudge,
    RubricGrader,
    Human,
    ReferenceBased,
    Trajectory,
    PairwiseJudge,
}

impl EvaluatorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModelJudge => "model_judge",
            Self::RubricGrader => "rubric_grader",
            Self::Human => "human",
            Self::ReferenceBased => "reference_based",
            Self::Trajectory => "trajectory",
            Self::PairwiseJudge => "pairwise_judge",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Output from any evaluator: per-dimension scores in [0, 10], a
/// weighted overall score, and a human-readable rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluator_type: EvaluatorType,
    /// dimension_name → score in [0, 10]. BTreeMap keeps serialized
    /// output stable across runs.
    pub scores: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_turn_scores: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EvaluationResult {
    pub fn new(evaluator_type: EvaluatorType) -> Self {
        Self {
            evaluator_type,
            scores: BTreeMap::new(),
            overall_score: 0.0,
            reasoning: String::new(),
            per_turn_scores: None,
            metadata: serde_json::Map::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metric value
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single computed metric. Unique per (conversation, name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl MetricValue {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            metadata: serde_json::Map::new(),
        }
    }
}
