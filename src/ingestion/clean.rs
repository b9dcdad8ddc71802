//! Data Cleaning - optional imputation and outlier clipping
//!
//! Off by default. When enabled, numeric nulls are imputed with the column
//! mean, categorical nulls with the column mode, and numeric values are
//! clipped to the 1.5-IQR fences. Summaries are recomputed on the cleaned
//! frame so downstream extraction sees consistent stats.

use crate::error::{Result, StoryError};
use crate::ingestion::schema_inference::{
    summarize_numeric, ColumnKind, ColumnSummary, TypedColumn, TypedTable,
};
use polars::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct CleaningOptions {
    pub impute_missing: bool,
    pub clip_outliers: bool,
}

impl CleaningOptions {
    pub fn is_noop(&self) -> bool {
        !self.impute_missing && !self.clip_outliers
    }
}

/// Produce a cleaned copy of the table. The input is untouched.
pub fn clean(table: &TypedTable, options: &CleaningOptions) -> Result<TypedTable> {
    if options.is_noop() || table.row_count == 0 {
        return Ok(table.clone());
    }

    let mut series_vec: Vec<Series> = Vec::with_capacity(table.columns.len());
    let mut columns: Vec<TypedColumn> = Vec::with_capacity(table.columns.len());

    for column in &table.columns {
        let series = table
            .df
            .column(&column.name)
            .map_err(|e| StoryError::Polars(format!("column {}: {e}", column.name)))?;

        match column.kind {
            ColumnKind::Numeric => {
                let ca = series
                    .f64()
                    .map_err(|e| StoryError::Polars(format!("column {}: {e}", column.name)))?;
                let (cleaned, summary) = clean_numeric(&column.name, ca, column, options)?;
                let non_null = cleaned.len() - cleaned.null_count();
                columns.push(TypedColumn {
                    name: column.name.clone(),
                    kind: column.kind,
                    null_count: cleaned.null_count(),
                    non_null_count: non_null,
                    summary,
                });
                series_vec.push(cleaned);
            }
            ColumnKind::Categorical if options.impute_missing => {
                let ca = series
                    .str()
                    .map_err(|e| StoryError::Polars(format!("column {}: {e}", column.name)))?;
                let cleaned = impute_categorical(&column.name, ca);
                let non_null = cleaned.len() - cleaned.null_count();
                columns.push(TypedColumn {
                    name: column.name.clone(),
                    kind: column.kind,
                    null_count: cleaned.null_count(),
                    non_null_count: non_null,
                    summary: column.summary.clone(),
                });
                series_vec.push(cleaned);
            }
            _ => {
                columns.push(column.clone());
                series_vec.push(series.clone());
            }
        }
    }

    let df = DataFrame::new(series_vec)
        .map_err(|e| StoryError::Polars(format!("failed to assemble cleaned table: {e}")))?;

    Ok(TypedTable {
        df,
        columns,
        row_count: table.row_count,
    })
}

fn clean_numeric(
    name: &str,
    ca: &Float64Chunked,
    column: &TypedColumn,
    options: &CleaningOptions,
) -> Result<(Series, ColumnSummary)> {
    let (q1, q3, mean) = match &column.summary {
        ColumnSummary::Numeric(s) => (s.q1, s.q3, s.mean),
        other => {
            return Err(StoryError::Polars(format!(
                "column {name} has non-numeric summary: {other:?}"
            )))
        }
    };
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;
    let has_values = column.non_null_count > 0;

    let values: Vec<Option<f64>> = ca
        .into_iter()
        .map(|v| {
            let v = match v {
                Some(v) => Some(v),
                None if options.impute_missing && has_values => Some(mean),
                None => None,
            };
            v.map(|v| {
                if options.clip_outliers {
                    v.clamp(lower, upper)
                } else {
                    v
                }
            })
        })
        .collect();

    let series = Series::new(name, values);
    let summary = {
        let ca = series
            .f64()
            .map_err(|e| StoryError::Polars(format!("column {name}: {e}")))?;
        ColumnSummary::Numeric(summarize_numeric(ca)?)
    };
    Ok((series, summary))
}

fn impute_categorical(name: &str, ca: &StringChunked) -> Series {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in ca.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mode = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string());

    let values: Vec<Option<String>> = ca
        .into_iter()
        .map(|v| match v {
            Some(v) => Some(v.to_string()),
            None => mode.clone(),
        })
        .collect();
    Series::new(name, values)
}
