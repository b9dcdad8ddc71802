//! Report Frames - chart-ready summary tables for the renderer collaborator
//!
//! The UI renders charts from polars frames, not from the internal summary
//! structs, so this module flattens per-column metadata into small frames and
//! carries the number formatting the original report views used.

use crate::error::{Result, StoryError};
use crate::ingestion::{ColumnSummary, TypedTable};
use polars::prelude::*;

/// One row per column: kind, null count, and numeric stats where they apply.
pub fn column_summary_frame(table: &TypedTable) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    let mut kinds: Vec<String> = Vec::new();
    let mut nulls: Vec<u32> = Vec::new();
    let mut mins: Vec<Option<f64>> = Vec::new();
    let mut means: Vec<Option<f64>> = Vec::new();
    let mut maxes: Vec<Option<f64>> = Vec::new();

    for column in &table.columns {
        names.push(column.name.clone());
        kinds.push(format!("{:?}", column.kind).to_lowercase());
        nulls.push(column.null_count as u32);
        match &column.summary {
            ColumnSummary::Numeric(s) if column.non_null_count > 0 => {
                mins.push(Some(s.min));
                means.push(Some(s.mean));
                maxes.push(Some(s.max));
            }
            _ => {
                mins.push(None);
                means.push(None);
                maxes.push(None);
            }
        }
    }

    DataFrame::new(vec![
        Series::new("column", names),
        Series::new("kind", kinds),
        Series::new("nulls", nulls),
        Series::new("min", mins),
        Series::new("mean", means),
        Series::new("max", maxes),
    ])
    .map_err(|e| StoryError::Polars(format!("failed to build summary frame: {e}")))
}

/// Value counts of a categorical column, ready for a bar chart.
pub fn top_values_frame(table: &TypedTable, column: &str) -> Result<DataFrame> {
    let typed = table.column(column).ok_or_else(|| {
        StoryError::Polars(format!("column {column} not found in typed table"))
    })?;

    let ColumnSummary::Categorical(summary) = &typed.summary else {
        return Err(StoryError::Polars(format!(
            "column {column} is not categorical"
        )));
    };

    let values: Vec<String> = summary.top_values.iter().map(|t| t.value.clone()).collect();
    let counts: Vec<u32> = summary.top_values.iter().map(|t| t.count as u32).collect();

    DataFrame::new(vec![
        Series::new("value", values),
        Series::new("count", counts),
    ])
    .map_err(|e| StoryError::Polars(format!("failed to build top-values frame: {e}")))
}

/// Human-readable numbers for narrative text and table cells: thousands become
/// K, millions become M, tiny magnitudes keep more precision.
pub fn format_number(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "N/A".to_string();
    }
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        format!("{:.precision$}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.precision$}K", value / 1_000.0)
    } else if abs < 0.01 && value != 0.0 {
        format!("{value:.6}")
    } else {
        format!("{value:.precision$}")
    }
}
