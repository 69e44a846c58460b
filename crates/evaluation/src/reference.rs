//! Reference-based evaluation — compare agent output to gold answers.
//!
//! Pure string similarity, no LLM: token-overlap F1, an LCS length
//! ratio, and normalized exact match, averaged over every (actual,
//! expected) pair found in the transcript.

use std::collections::BTreeMap;
use std::collections::HashSet;

use cq_domain::error::Result;
use cq_domain::eval::{EvaluationResult, EvaluatorType};
use cq_domain::rubric::RubricDimension;
use cq_domain::tool::Role;
use cq_domain::turn::Turn;

use crate::{round2, round4, Evaluator};

#[derive(Default)]
pub struct ReferenceEvaluator;

impl ReferenceEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// For each user turn carrying an `expected_response`, pair it with
    /// the content of the next assistant turn.
    fn extract_pairs(turns: &[Turn]) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (i, turn) in turns.iter().enumerate() {
            let Some(expected) = &turn.expected_response else {
                continue;
            };
            if turn.role != Role::User {
                continue;
            }
            if let Some(next_assistant) = turns[i + 1..]
                .iter()
                .find(|t| t.role == Role::Assistant)
            {
                pairs.push((next_assistant.content.clone(), expected.clone()));
            }
        }
        pairs
    }
}

#[async_trait::async_trait]
impl Evaluator for ReferenceEvaluator {
    async fn evaluate(
        &self,
        turns: &[Turn],
        _dimensions: &[RubricDimension],
    ) -> Result<EvaluationResult> {
        let pairs = Self::extract_pairs(turns);

        let mut result = EvaluationResult::new(EvaluatorType::ReferenceBased);
        if pairs.is_empty() {
            result.scores = BTreeMap::from([
                ("token_overlap".to_string(), 0.0),
                ("lcs_ratio".to_string(), 0.0),
                ("exact_match".to_string(), 0.0),
            ]);
            result.reasoning = "No reference answers available in scenario.".into();
            return Ok(result);
        }

        let n = pairs.len() as f64;
        let mut overlap_sum = 0.0;
        let mut lcs_sum = 0.0;
        let mut exact_sum = 0.0;
        for (actual, expected) in &pairs {
            overlap_sum += token_overlap(actual, expected);
            lcs_sum += lcs_ratio(actual, expected);
            exact_sum += exact_match(actual, expected);
        }
        let avg_overlap = overlap_sum / n;
        let avg_lcs = lcs_sum / n;
        let avg_exact = exact_sum / n;

        result.scores = BTreeMap::from([
            ("token_overlap".to_string(), round4(avg_overlap)),
            ("lcs_ratio".to_string(), round4(avg_lcs)),
            ("exact_match".to_string(), round4(avg_exact)),
        ]);
        result.overall_score = round2((0.4 * avg_overlap + 0.4 * avg_lcs + 0.2 * avg_exact) * 10.0);
        result.reasoning = format!(
            "Evaluated {} reference pair(s). Token overlap={avg_overlap:.3}, \
             LCS ratio={avg_lcs:.3}, Exact match={avg_exact:.3}.",
            pairs.len()
        );
        Ok(result)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Similarity primitives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    normalize(text).split(' ').filter(|t| !t.is_empty()).map(String::from).collect()
}

/// Unigram set-overlap F1.
fn token_overlap(actual: &str, expected: &str) -> f64 {
    let actual_tokens: HashSet<String> = tokenize(actual).into_iter().collect();
    let expected_tokens: HashSet<String> = tokenize(expected).into_iter().collect();

    if actual_tokens.is_empty() || expected_tokens.is_empty() {
        return 0.0;
    }

    let overlap = actual_tokens.intersection(&expected_tokens).count() as f64;
    let precision = overlap / actual_tokens.len() as f64;
    let recall = overlap / expected_tokens.len() as f64;
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// Longest-common-subsequence length over tokens, divided by the longer
/// side.
fn lcs_ratio(actual: &str, expected: &str) -> f64 {
    let a = tokenize(actual);
    let e = tokenize(expected);
    if a.is_empty() || e.is_empty() {
        return 0.0;
    }
    lcs_length(&a, &e) as f64 / a.len().max(e.len()) as f64
}

pub(crate) fn lcs_length<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    dp[m][n]
}

fn exact_match(actual: &str, expected: &str) -> f64 {
    if normalize(actual) == normalize(expected) {
        1.0
    } else {
        0.0
    }
}
