//! Trajectory evaluation — did the agent call the right tools in the
//! right order?
//!
//! Compares the actual tool-call sequence against the scenario's
//! expected sequence with LCS matching, precision/recall over tool
//! sets, and a concordant-pair order score. Pure math, no LLM.

use std::collections::{BTreeMap, HashMap, HashSet};

use cq_domain::error::Result;
use cq_domain::eval::{EvaluationResult, EvaluatorType};
use cq_domain::rubric::RubricDimension;
use cq_domain::turn::Turn;

use crate::reference::lcs_length;
use crate::{round2, round4, Evaluator};

pub struct TrajectoryEvaluator {
    expected: Vec<String>,
}

impl TrajectoryEvaluator {
    pub fn new(expected_tool_sequence: Vec<String>) -> Self {
        Self {
            expected: expected_tool_sequence,
        }
    }

    /// Ordered tool names across all turns.
    fn extract_tool_sequence(turns: &[Turn]) -> Vec<String> {
        turns
            .iter()
            .flat_map(|t| t.tool_calls.iter().map(|tc| tc.name.clone()))
            .collect()
    }
}

#[async_trait::async_trait]
impl Evaluator for TrajectoryEvaluator {
    async fn evaluate(
        &self,
        turns: &[Turn],
        _dimensions: &[RubricDimension],
    ) -> Result<EvaluationResult> {
        let mut result = EvaluationResult::new(EvaluatorType::Trajectory);

        if self.expected.is_empty() {
            result.reasoning = "No expected tool sequence defined.".into();
            return Ok(result);
        }

        let actual = Self::extract_tool_sequence(turns);
        let expected = &self.expected;

        let seq_match = sequence_match_ratio(&actual, expected);
        let prec = precision(&actual, expected);
        let rec = recall(&actual, expected);
        let order = order_score(&actual, expected);
        let unnecessary = unnecessary_action_count(&actual, expected);

        result.scores = BTreeMap::from([
            ("sequence_match_ratio".to_string(), round4(seq_match)),
            ("precision".to_string(), round4(prec)),
            ("recall".to_string(), round4(rec)),
            ("order_score".to_string(), round4(order)),
            ("unnecessary_actions".to_string(), unnecessary as f64),
        ]);
        result.overall_score = round2((seq_match + prec + rec + order) / 4.0 * 10.0);
        result.reasoning = format!(
            "Actual tools: {actual:?}. Expected: {expected:?}. \
             Sequence match={seq_match:.3}, precision={prec:.3}, recall={rec:.3}, \
             order={order:.3}, unnecessary={unnecessary}."
        );
        Ok(result)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sequence metrics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// LCS length / |expected|. 1.0 = every expected tool called in order.
fn sequence_match_ratio(actual: &[String], expected: &[String]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    lcs_length(actual, expected) as f64 / expected.len() as f64
}

/// Share of actual calls that were expected at all.
fn precision(actual: &[String], expected: &[String]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let expected_set: HashSet<&String> = expected.iter().collect();
    actual.iter().filter(|t| expected_set.contains(t)).count() as f64 / actual.len() as f64
}

/// Share of expected tools that were called at all.
fn recall(actual: &[String], expected: &[String]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    let actual_set: HashSet<&String> = actual.iter().collect();
    expected.iter().filter(|t| actual_set.contains(t)).count() as f64 / expected.len() as f64
}

/// Concordant-pair fraction over shared tools ranked by expected
/// position, in [0, 1].
fn order_score(actual: &[String], expected: &[String]) -> f64 {
    let expected_set: HashSet<&String> = expected.iter().collect();
    let shared: Vec<&String> = actual.iter().filter(|t| expected_set.contains(t)).collect();
    if shared.len() < 2 {
        return if shared.is_empty() { 0.0 } else { 1.0 };
    }

    let rank_map: HashMap<&String, usize> = expected
        .iter()
        .enumerate()
        .map(|(i, t)| (t, i))
        .collect();
    let ranks: Vec<usize> = shared
        .iter()
        .map(|t| *rank_map.get(*t).unwrap_or(&0))
        .collect();

    let mut concordant = 0usize;
    let mut total = 0usize;
    for i in 0..ranks.len() {
        for j in (i + 1)..ranks.len() {
            total += 1;
            if ranks[i] < ranks[j] {
                concordant += 1;
            }
        }
    }
    if total == 0 {
        1.0
    } else {
        concordant as f64 / total as f64
    }
}

/// Calls to tools that appear nowhere in the expected sequence.
fn unnecessary_action_count(actual: &[String], expected: &[String]) -> usize {
    let expected_set: HashSet<&String> = expected.iter().collect();
    actual.iter().filter(|t| !expected_set.contains(t)).count()
}
