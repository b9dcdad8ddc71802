//! Outlier detection - robust z-scores per numeric column
//!
//! Scores use the median/MAD form of the z-score (0.6745 scaling), so the
//! scale estimate itself is not distorted by the values being flagged. When
//! the MAD collapses to zero the mean absolute deviation takes over; a column
//! with no spread at all produces no flags.

use super::{numeric_values, ExtractorConfig, Outlier};
use crate::error::Result;
use crate::ingestion::TypedTable;

const MAD_SCALE: f64 = 0.6745;

pub fn extract_outliers(table: &TypedTable, config: &ExtractorConfig) -> Result<Vec<Outlier>> {
    let mut outliers = Vec::new();

    for column in table.numeric_columns() {
        let values = numeric_values(table, &column.name)?;
        if values.len() < 2 {
            continue;
        }

        let mut flagged = score_column(&column.name, &values, config.z_score_threshold);
        flagged.sort_by(|a, b| {
            b.deviation
                .abs()
                .partial_cmp(&a.deviation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.row.cmp(&b.row))
        });
        flagged.truncate(config.max_outliers_per_column);
        outliers.extend(flagged);
    }

    Ok(outliers)
}

fn score_column(column: &str, values: &[(usize, f64)], threshold: f64) -> Vec<Outlier> {
    let samples: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    let med = median(&samples);

    let abs_dev: Vec<f64> = samples.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&abs_dev);

    let scale = if mad > 0.0 {
        mad / MAD_SCALE
    } else {
        // Fall back to the mean absolute deviation; 1.2533 makes it a
        // consistent sigma estimate for normal data.
        let mean_abs = abs_dev.iter().sum::<f64>() / abs_dev.len() as f64;
        mean_abs * 1.2533
    };

    if scale == 0.0 {
        // Constant column: nothing deviates.
        return Vec::new();
    }

    values
        .iter()
        .filter_map(|(row, value)| {
            let score = (value - med) / scale;
            if score.abs() > threshold {
                Some(Outlier {
                    row: *row,
                    column: column.to_string(),
                    value: *value,
                    deviation: score,
                })
            } else {
                None
            }
        })
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
