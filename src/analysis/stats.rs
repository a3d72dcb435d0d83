//! Descriptive statistics over numeric columns.

use crate::models::ColumnStats;

/// Compute count, mean, sample standard deviation, min, quartiles and max.
///
/// Non-finite values count as missing and are left out of every figure.
pub fn describe(values: &[f64]) -> ColumnStats {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let count = sorted.len();
    if count == 0 {
        return ColumnStats::default();
    }

    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean = sorted.iter().sum::<f64>() / count as f64;

    // Sample standard deviation (n - 1); undefined for a single value.
    let std = if count > 1 {
        let variance =
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        Some(variance.sqrt())
    } else {
        None
    };

    ColumnStats {
        count,
        mean: Some(mean),
        std,
        min: sorted.first().copied(),
        p25: Some(quantile(&sorted, 0.25)),
        p50: Some(quantile(&sorted, 0.50)),
        p75: Some(quantile(&sorted, 0.75)),
        max: sorted.last().copied(),
    }
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
