//! Evaluators and statistics.
//!
//! Six evaluator kinds score completed transcripts (LLM-as-judge,
//! deterministic rubric grader, pairwise judge, reference-based,
//! trajectory, automated metrics), and the [`stats`] modules combine
//! stored evaluations into rankings, agreement coefficients, calibration
//! curves, and per-run aggregates.

mod grader;
mod judge;
mod metrics;
mod pairwise;
mod reference;
mod trajectory;
mod transcript;

pub mod stats;

pub use grader::RubricGraderEvaluator;
pub use judge::ModelJudgeEvaluator;
pub use metrics::compute_automated_metrics;
pub use pairwise::{PairwiseJudgeEvaluator, PairwiseResult, Preference};
pub use reference::ReferenceEvaluator;
pub use trajectory::TrajectoryEvaluator;

use std::collections::BTreeMap;

use cq_domain::error::Result;
use cq_domain::eval::EvaluationResult;
use cq_domain::rubric::RubricDimension;
use cq_domain::turn::Turn;

/// Contract shared by the transcript evaluators.
#[async_trait::async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        turns: &[Turn],
        dimensions: &[RubricDimension],
    ) -> Result<EvaluationResult>;
}

/// Weight-normalized average over the dimensions that were scored,
/// rounded to two decimals. Dimensions missing from `scores` contribute
/// neither score nor weight.
pub fn weighted_overall(scores: &BTreeMap<String, f64>, dimensions: &[RubricDimension]) -> f64 {
    let mut total_weight = 0.0;
    let mut weighted_sum = 0.0;
    for dim in dimensions {
        if let Some(score) = scores.get(&dim.name) {
            weighted_sum += score * dim.weight;
            total_weight += dim.weight;
        }
    }
    if total_weight == 0.0 {
        return 0.0;
    }
    round2(weighted_sum / total_weight)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
