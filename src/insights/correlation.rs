//! Correlation detection - Pearson coefficients over numeric column pairs

use super::{numeric_values, Correlation, CorrelationStrength, ExtractorConfig};
use crate::error::Result;
use crate::ingestion::TypedTable;
use itertools::Itertools;

/// Pairs need at least this many complete observations to be meaningful.
const MIN_PAIRED_SAMPLES: usize = 3;

/// Compute Pearson r for every numeric column pair, keep pairs at or above the
/// configured absolute threshold, sorted descending by |r| with column-name
/// order breaking ties. Column pairs are enumerated in lexical order so the
/// output is deterministic.
pub fn extract_correlations(
    table: &TypedTable,
    config: &ExtractorConfig,
) -> Result<Vec<Correlation>> {
    let mut names: Vec<&str> = table
        .numeric_columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    names.sort_unstable();

    let mut correlations = Vec::new();
    for (a, b) in names.iter().tuple_combinations() {
        let left = numeric_values(table, a)?;
        let right = numeric_values(table, b)?;
        if let Some(r) = pairwise_pearson(&left, &right) {
            if r.abs() >= config.correlation_threshold {
                correlations.push(Correlation {
                    column_a: a.to_string(),
                    column_b: b.to_string(),
                    coefficient: r,
                    strength: CorrelationStrength::from_coefficient(r),
                });
            }
        }
    }

    correlations.sort_by(|x, y| {
        y.coefficient
            .abs()
            .partial_cmp(&x.coefficient.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.column_a.cmp(&y.column_a))
            .then_with(|| x.column_b.cmp(&y.column_b))
    });

    Ok(correlations)
}

/// Pearson r over rows where both columns are non-null. Returns None for
/// degenerate inputs (too few pairs, zero variance on either side).
pub(crate) fn pairwise_pearson(left: &[(usize, f64)], right: &[(usize, f64)]) -> Option<f64> {
    let right_by_row: std::collections::HashMap<usize, f64> =
        right.iter().copied().collect();
    let pairs: Vec<(f64, f64)> = left
        .iter()
        .filter_map(|(row, x)| right_by_row.get(row).map(|y| (*x, *y)))
        .collect();
    if pairs.len() < MIN_PAIRED_SAMPLES {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
