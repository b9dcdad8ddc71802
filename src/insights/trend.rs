//! Trend detection - least-squares direction per numeric column

use super::{numeric_values, ExtractorConfig, Trend, TrendDirection};
use crate::error::{Result, StoryError};
use crate::ingestion::TypedTable;

/// Slopes flatter than this (relative to the ordering span) count as Flat.
const FLAT_EPSILON: f64 = 1e-12;

/// Compute a trend per numeric column. The ordering axis is the first datetime
/// column (epoch seconds) when one exists, otherwise the row index. Columns
/// with fewer non-null samples than the configured minimum are omitted.
pub fn extract_trends(table: &TypedTable, config: &ExtractorConfig) -> Result<Vec<Trend>> {
    let ordering = ordering_axis(table)?;
    let mut trends = Vec::new();

    for column in table.numeric_columns() {
        let values = numeric_values(table, &column.name)?;
        let points: Vec<(f64, f64)> = values
            .iter()
            .filter_map(|(idx, v)| ordering.get(*idx).and_then(|x| x.map(|x| (x, *v))))
            .collect();
        if points.len() < config.min_trend_samples {
            continue;
        }
        if let Some(trend) = fit_trend(&column.name, &points) {
            trends.push(trend);
        }
    }

    Ok(trends)
}

/// Per-row ordering value: epoch seconds of the first datetime column, or the
/// row index when the table has no usable time axis.
fn ordering_axis(table: &TypedTable) -> Result<Vec<Option<f64>>> {
    if let Some(time_col) = table.first_datetime_column() {
        let series = table
            .df
            .column(&time_col.name)
            .map_err(|e| StoryError::Polars(format!("column {}: {e}", time_col.name)))?;
        let ca = series
            .i64()
            .map_err(|e| StoryError::Polars(format!("column {}: {e}", time_col.name)))?;
        return Ok(ca.into_iter().map(|v| v.map(|v| v as f64)).collect());
    }
    Ok((0..table.row_count).map(|i| Some(i as f64)).collect())
}

fn fit_trend(column: &str, points: &[(f64, f64)]) -> Option<Trend> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 {
        // Degenerate ordering (all timestamps equal): no trend to report.
        return None;
    }

    let slope = cov / var_x;
    let span = points
        .iter()
        .map(|(x, _)| *x)
        .fold(f64::NEG_INFINITY, f64::max)
        - points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);

    let (direction, magnitude) = if var_y == 0.0 || slope.abs() * span < FLAT_EPSILON {
        (TrendDirection::Flat, 0.0)
    } else {
        let r = cov / (var_x.sqrt() * var_y.sqrt());
        let direction = if slope > 0.0 {
            TrendDirection::Rising
        } else {
            TrendDirection::Falling
        };
        (direction, r.abs().clamp(0.0, 1.0))
    };

    Some(Trend {
        column: column.to_string(),
        direction,
        magnitude,
        slope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::{load_raw_table, SchemaDetector};

    fn table(csv: &[u8]) -> TypedTable {
        let raw = load_raw_table(csv).unwrap();
        SchemaDetector::new().detect(&raw).unwrap()
    }

    #[test]
    fn test_rising_trend_over_index() {
        let t = table(b"v\n1\n2\n3\n4\n5\n6\n");
        let trends = extract_trends(&t, &ExtractorConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].direction, TrendDirection::Rising);
        assert!((trends[0].magnitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_falling_trend_over_time_column() {
        let t = table(
            b"date,v\n2024-01-01,50\n2024-01-02,40\n2024-01-03,30\n2024-01-04,20\n2024-01-05,10\n",
        );
        let trends = extract_trends(&t, &ExtractorConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].column, "v");
        assert_eq!(trends[0].direction, TrendDirection::Falling);
        assert!(trends[0].slope < 0.0);
    }

    #[test]
    fn test_constant_column_is_flat() {
        let t = table(b"v\n7\n7\n7\n7\n7\n");
        let trends = extract_trends(&t, &ExtractorConfig::default()).unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].direction, TrendDirection::Flat);
        assert_eq!(trends[0].magnitude, 0.0);
    }

    #[test]
    fn test_insufficient_samples_omitted() {
        let t = table(b"v\n1\n2\n3\n");
        let trends = extract_trends(&t, &ExtractorConfig::default()).unwrap();
        assert!(trends.is_empty());
    }
}
