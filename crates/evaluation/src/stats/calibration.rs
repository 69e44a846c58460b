//! Calibration analysis — how well model-judge scores track human
//! scores.

use cq_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};

use super::pearson;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metrics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Statistical comparison between paired human and model scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationMetrics {
    pub pearson_r: f64,
    pub spearman_rho: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// mean(model − human); positive means the model scores higher.
    pub bias: f64,
    pub n: usize,
}

/// Agreement metrics over paired scores. Requires equal lengths and at
/// least two pairs.
pub fn calibration_metrics(human: &[f64], model: &[f64]) -> Result<CalibrationMetrics> {
    let n = human.len();
    if n != model.len() {
        return Err(Error::Validation(format!(
            "length mismatch: {n} human vs {} model",
            model.len()
        )));
    }
    if n < 2 {
        return Err(Error::Validation(format!(
            "need at least 2 paired observations, got {n}"
        )));
    }

    let mae = human
        .iter()
        .zip(model)
        .map(|(h, m)| (h - m).abs())
        .sum::<f64>()
        / n as f64;
    let rmse = (human
        .iter()
        .zip(model)
        .map(|(h, m)| (h - m).powi(2))
        .sum::<f64>()
        / n as f64)
        .sqrt();
    let bias = human.iter().zip(model).map(|(h, m)| m - h).sum::<f64>() / n as f64;

    Ok(CalibrationMetrics {
        pearson_r: round4(pearson(human, model)),
        spearman_rho: round4(spearman(human, model)),
        mae: round4(mae),
        rmse: round4(rmse),
        bias: round4(bias),
        n,
    })
}

/// Spearman rank correlation: Pearson over average ranks (ties share
/// their average rank).
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&to_ranks(x), &to_ranks(y))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Calibration curve
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One bin of a calibration curve. Perfect calibration has
/// `avg_human ≈ avg_model` in every bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bin_center: f64,
    pub avg_human: f64,
    pub avg_model: f64,
    pub count: usize,
}

/// Bin the model-score range uniformly into `num_bins` and average both
/// sides per non-empty bin. A degenerate range collapses to one bin.
pub fn calibration_curve(human: &[f64], model: &[f64], num_bins: usize) -> Vec<CalibrationBin> {
    if human.is_empty() || model.is_empty() || num_bins == 0 {
        return Vec::new();
    }

    let min_score = model.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = model.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max_score == min_score {
        return vec![CalibrationBin {
            bin_center: round2(min_score),
            avg_human: round4(human.iter().sum::<f64>() / human.len() as f64),
            avg_model: round4(min_score),
            count: human.len(),
        }];
    }

    let bin_width = (max_score - min_score) / num_bins as f64;
    let mut bins: Vec<Vec<(f64, f64)>> = vec![Vec::new(); num_bins];
    for (&h, &m) in human.iter().zip(model) {
        let idx = (((m - min_score) / bin_width) as usize).min(num_bins - 1);
        bins[idx].push((h, m));
    }

    bins.into_iter()
        .enumerate()
        .filter(|(_, pairs)| !pairs.is_empty())
        .map(|(idx, pairs)| {
            let count = pairs.len();
            let avg_h = pairs.iter().map(|p| p.0).sum::<f64>() / count as f64;
            let avg_m = pairs.iter().map(|p| p.1).sum::<f64>() / count as f64;
            CalibrationBin {
                bin_center: round2(min_score + (idx as f64 + 0.5) * bin_width),
                avg_human: round4(avg_h),
                avg_model: round4(avg_m),
                count,
            }
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert values to 1-based average ranks (ties averaged).
fn to_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n - 1 && indexed[j + 1].1 == indexed[i].1 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for item in &indexed[i..=j] {
            ranks[item.0] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_scores_are_perfectly_calibrated() {
        let scores = [3.0, 5.0, 7.0, 9.0];
        let m = calibration_metrics(&scores, &scores).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.bias, 0.0);
        assert_eq!(m.pearson_r, 1.0);
        assert_eq!(m.spearman_rho, 1.0);
        assert_eq!(m.n, 4);
    }

    #[test]
    fn constant_offset_shows_up_as_bias() {
        let human = [5.0, 6.0, 7.0];
        let model = [6.0, 7.0, 8.0];
        let m = calibration_metrics(&human, &model).unwrap();
        assert_eq!(m.bias, 1.0);
        assert_eq!(m.mae, 1.0);
        assert_eq!(m.rmse, 1.0);
        assert_eq!(m.pearson_r, 1.0);
    }

    #[test]
    fn shape_errors_are_validation_errors() {
        assert!(calibration_metrics(&[1.0, 2.0], &[1.0]).is_err());
        assert!(calibration_metrics(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn spearman_handles_ties_with_average_ranks() {
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [10.0, 20.0, 20.0, 30.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn to_ranks_averages_ties() {
        assert_eq!(to_ranks(&[10.0, 20.0, 20.0, 30.0]), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn single_bin_collapses_to_global_averages() {
        let human = [4.0, 6.0, 8.0];
        let model = [5.0, 6.0, 7.0];
        let bins = calibration_curve(&human, &model, 1);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
        assert_eq!(bins[0].avg_human, 6.0);
        assert_eq!(bins[0].avg_model, 6.0);
    }

    #[test]
    fn degenerate_model_range_is_one_bin() {
        let human = [4.0, 6.0];
        let model = [5.0, 5.0];
        let bins = calibration_curve(&human, &model, 10);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].bin_center, 5.0);
        assert_eq!(bins[0].avg_human, 5.0);
        assert_eq!(bins[0].count, 2);
    }

    #[test]
    fn bins_partition_the_pairs() {
        let human: Vec<f64> = (0..20).map(|i| i as f64 / 2.0).collect();
        let model: Vec<f64> = (0..20).map(|i| i as f64 / 2.0 + 0.25).collect();
        let bins = calibration_curve(&human, &model, 5);
        let total: usize = bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 20);
        assert!(bins.len() <= 5);
        // Bin centers are increasing.
        for pair in bins.windows(2) {
            assert!(pair[0].bin_center < pair[1].bin_center);
        }
    }

    #[test]
    fn empty_inputs_give_empty_curve() {
        assert!(calibration_curve(&[], &[], 10).is_empty());
    }
}
