//! Metric aggregation, z-score calibration, weighted averaging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregated metric
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Descriptive statistics for one metric across conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub metric_name: String,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 when n < 2.
    pub std_dev: f64,
    pub min_val: f64,
    pub max_val: f64,
    pub sample_count: usize,
}

/// Compute descriptive statistics for a list of metric values. An empty
/// list yields an all-zero aggregate with `sample_count` 0.
pub fn aggregate_metric_values(name: &str, values: &[f64]) -> AggregatedMetric {
    if values.is_empty() {
        return AggregatedMetric {
            metric_name: name.to_string(),
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min_val: 0.0,
            max_val: 0.0,
            sample_count: 0,
        };
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    let std_dev = if n >= 2 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    AggregatedMetric {
        metric_name: name.to_string(),
        mean: round4(mean),
        median: round4(median),
        std_dev: round4(std_dev),
        min_val: round4(sorted[0]),
        max_val: round4(sorted[n - 1]),
        sample_count: n,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Score normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize scores to z-scores (mean 0, stdev 1). Identity when fewer
/// than two scores or when all scores are identical.
pub fn z_score_calibrate(scores: &[f64]) -> Vec<f64> {
    if scores.len() < 2 {
        return scores.to_vec();
    }

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let std_dev =
        (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();

    if std_dev == 0.0 {
        return scores.to_vec();
    }

    scores.iter().map(|s| round4((s - mean) / std_dev)).collect()
}

/// Weighted average of dimension scores. Weights are renormalized over
/// the dimensions actually present in `scores`.
pub fn weighted_dimension_average(
    scores: &BTreeMap<String, f64>,
    weights: &BTreeMap<String, f64>,
) -> f64 {
    let mut total_weight = 0.0;
    let mut weighted_sum = 0.0;
    for (name, score) in scores {
        let w = weights.get(name).copied().unwrap_or(0.0);
        weighted_sum += score * w;
        total_weight += w;
    }
    if total_weight == 0.0 {
        return 0.0;
    }
    round4(weighted_sum / total_weight)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
