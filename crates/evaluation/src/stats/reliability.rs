//! Interrater reliability — Krippendorff's alpha for interval data.
//!
//! Measures agreement among multiple raters scoring the same
//! conversations, plus pairwise Pearson correlations between raters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pearson;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Alpha
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Krippendorff's alpha for interval data.
///
/// `ratings_matrix`: rows = items, columns = raters; `None` marks a
/// missing rating. Returns 1.0 for perfect agreement, 0.0 for chance
/// level, negative for systematic disagreement.
///
/// Observed disagreement `D_o` is the mean squared pairwise difference
/// among values *within* each item (items with < 2 ratings are
/// skipped); expected disagreement `D_e` is the mean squared pairwise
/// difference across *all* values. `alpha = 1 - D_o / D_e`, and 1.0
/// when `D_e` is zero.
pub fn krippendorffs_alpha(ratings_matrix: &[Vec<Option<f64>>]) -> f64 {
    if ratings_matrix.is_empty() {
        return 0.0;
    }

    let mut observed_sum = 0.0;
    let mut observed_count = 0usize;
    let mut all_values: Vec<f64> = Vec::new();

    for row in ratings_matrix {
        let values: Vec<f64> = row.iter().flatten().copied().collect();
        all_values.extend(&values);
        if values.len() < 2 {
            continue;
        }
        for i in 0..values.len() {
            for j in (i + 1)..values.len() {
                observed_sum += (values[i] - values[j]).powi(2);
                observed_count += 1;
            }
        }
    }

    if observed_count == 0 || all_values.len() < 2 {
        return 0.0;
    }
    let d_o = observed_sum / observed_count as f64;

    let mut expected_sum = 0.0;
    let mut expected_count = 0usize;
    for i in 0..all_values.len() {
        for j in (i + 1)..all_values.len() {
            expected_sum += (all_values[i] - all_values[j]).powi(2);
            expected_count += 1;
        }
    }
    let d_e = expected_sum / expected_count as f64;

    if d_e == 0.0 {
        return 1.0;
    }
    round4(1.0 - d_o / d_e)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Grouped reliability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Results of an interrater reliability analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityResult {
    /// Alpha over per-item mean scores (> 0.8 is usually "good").
    pub alpha: f64,
    pub num_items: usize,
    pub num_raters: usize,
    pub per_dimension_alpha: BTreeMap<String, f64>,
}

/// Per-rater dimension scores for one conversation, outer-keyed by
/// conversation id.
pub type GroupedEvaluations = BTreeMap<String, Vec<BTreeMap<String, f64>>>;

/// Compute overall and per-dimension alpha from evaluations grouped by
/// conversation. Fewer than two raters anywhere yields alpha 0.
pub fn compute_reliability(grouped: &GroupedEvaluations, dimensions: &[String]) -> ReliabilityResult {
    let num_items = grouped.len();
    let max_raters = grouped.values().map(Vec::len).max().unwrap_or(0);

    if max_raters < 2 {
        return ReliabilityResult {
            alpha: 0.0,
            num_items,
            num_raters: max_raters,
            per_dimension_alpha: BTreeMap::new(),
        };
    }

    // Overall: mean across dimensions stands in for an overall score.
    let overall_matrix: Vec<Vec<Option<f64>>> = grouped
        .values()
        .map(|evals| {
            (0..max_raters)
                .map(|i| {
                    evals.get(i).and_then(|scores| {
                        let vals: Vec<f64> = dimensions
                            .iter()
                            .filter_map(|d| scores.get(d).copied())
                            .collect();
                        if vals.is_empty() {
                            None
                        } else {
                            Some(vals.iter().sum::<f64>() / vals.len() as f64)
                        }
                    })
                })
                .collect()
        })
        .collect();

    let mut per_dimension_alpha = BTreeMap::new();
    for dim in dimensions {
        let dim_matrix: Vec<Vec<Option<f64>>> = grouped
            .values()
            .map(|evals| {
                (0..max_raters)
                    .map(|i| evals.get(i).and_then(|scores| scores.get(dim).copied()))
                    .collect()
            })
            .collect();
        per_dimension_alpha.insert(dim.clone(), krippendorffs_alpha(&dim_matrix));
    }

    ReliabilityResult {
        alpha: krippendorffs_alpha(&overall_matrix),
        num_items,
        num_raters: max_raters,
        per_dimension_alpha,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pairwise rater correlations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaterCorrelation {
    pub rater_a: usize,
    pub rater_b: usize,
    pub pearson_r: f64,
    pub n: usize,
}

/// Pearson correlation between every rater pair on one dimension.
/// Pairs with fewer than two shared items are omitted.
pub fn pairwise_correlations(grouped: &GroupedEvaluations, dimension: &str) -> Vec<RaterCorrelation> {
    let max_raters = grouped.values().map(Vec::len).max().unwrap_or(0);
    let mut results = Vec::new();

    for ra in 0..max_raters {
        for rb in (ra + 1)..max_raters {
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for evals in grouped.values() {
                if let (Some(a), Some(b)) = (evals.get(ra), evals.get(rb)) {
                    if let (Some(&va), Some(&vb)) = (a.get(dimension), b.get(dimension)) {
                        xs.push(va);
                        ys.push(vb);
                    }
                }
            }
            if xs.len() >= 2 {
                results.push(RaterCorrelation {
                    rater_a: ra,
                    rater_b: rb,
                    pearson_r: round4(pearson(&xs, &ys)),
                    n: xs.len(),
                });
            }
        }
    }

    results
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> Vec<Vec<Option<f64>>> {
        rows.iter()
            .map(|row| row.iter().map(|&v| Some(v)).collect())
            .collect()
    }

    #[test]
    fn perfect_agreement_is_one() {
        // S4: identical rows per item.
        let m = matrix(&[&[5.0, 5.0, 5.0], &[8.0, 8.0, 8.0], &[3.0, 3.0, 3.0]]);
        assert_eq!(krippendorffs_alpha(&m), 1.0);
    }

    #[test]
    fn systematic_disagreement_is_low() {
        // S4: maximal within-item spread.
        let m = matrix(&[&[1.0, 10.0], &[10.0, 1.0], &[1.0, 10.0], &[10.0, 1.0]]);
        assert!(krippendorffs_alpha(&m) < 0.5);
    }

    #[test]
    fn identical_values_everywhere_is_one() {
        // Zero expected disagreement.
        let m = matrix(&[&[7.0, 7.0], &[7.0, 7.0]]);
        assert_eq!(krippendorffs_alpha(&m), 1.0);
    }

    #[test]
    fn items_with_single_rating_are_skipped() {
        let m = vec![
            vec![Some(5.0), None],
            vec![Some(4.0), Some(4.0)],
            vec![Some(6.0), Some(6.0)],
        ];
        // Only the two complete items carry observed disagreement (zero).
        assert_eq!(krippendorffs_alpha(&m), 1.0);
    }

    #[test]
    fn empty_or_degenerate_matrices_are_zero() {
        assert_eq!(krippendorffs_alpha(&[]), 0.0);
        assert_eq!(krippendorffs_alpha(&[vec![Some(5.0)]]), 0.0);
    }

    fn grouped(perfect: bool) -> GroupedEvaluations {
        let mut g = GroupedEvaluations::new();
        for (i, base) in [5.0, 8.0, 3.0].iter().enumerate() {
            let second = if perfect { *base } else { 11.0 - *base };
            g.insert(
                format!("conv{i}"),
                vec![
                    BTreeMap::from([("helpfulness".to_string(), *base)]),
                    BTreeMap::from([("helpfulness".to_string(), second)]),
                ],
            );
        }
        g
    }

    #[test]
    fn grouped_reliability_perfect() {
        let result = compute_reliability(&grouped(true), &["helpfulness".to_string()]);
        assert_eq!(result.alpha, 1.0);
        assert_eq!(result.num_items, 3);
        assert_eq!(result.num_raters, 2);
        assert_eq!(result.per_dimension_alpha["helpfulness"], 1.0);
    }

    #[test]
    fn single_rater_short_circuits() {
        let mut g = GroupedEvaluations::new();
        g.insert(
            "conv0".into(),
            vec![BTreeMap::from([("helpfulness".to_string(), 5.0)])],
        );
        let result = compute_reliability(&g, &["helpfulness".to_string()]);
        assert_eq!(result.alpha, 0.0);
        assert_eq!(result.num_raters, 1);
    }

    #[test]
    fn correlations_track_agreement() {
        let perfect = pairwise_correlations(&grouped(true), "helpfulness");
        assert_eq!(perfect.len(), 1);
        assert_eq!(perfect[0].n, 3);
        assert!((perfect[0].pearson_r - 1.0).abs() < 1e-9);

        let inverted = pairwise_correlations(&grouped(false), "helpfulness");
        assert!((inverted[0].pearson_r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn correlations_skip_thin_pairs() {
        let mut g = GroupedEvaluations::new();
        g.insert(
            "conv0".into(),
            vec![
                BTreeMap::from([("helpfulness".to_string(), 5.0)]),
                BTreeMap::from([("helpfulness".to_string(), 6.0)]),
            ],
        );
        // Only one shared item → no correlation entry.
        assert!(pairwise_correlations(&g, "helpfulness").is_empty());
    }
}
