//! Schema Inference - deterministic column typing from untyped rows
//!
//! Samples a bounded prefix of rows and applies coercion trials per column in
//! order numeric -> datetime -> categorical -> text. The first kind that at
//! least `coercion_threshold` of the sampled non-null values coerce into wins.
//! The full column is then materialised as a typed polars series, with values
//! that fail the chosen coercion recorded as null.

use crate::error::{Result, StoryError};
use crate::ingestion::csv_loader::RawTable;
use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// Thousands-separated numerics like "1,234,567.89".
    static ref THOUSANDS_RE: Regex =
        Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid thousands regex");
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Datetime,
    Categorical,
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub cardinality: usize,
    pub top_values: Vec<TopValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatetimeSummary {
    pub min: String,
    pub max: String,
    pub granularity: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextSummary {
    pub distinct: usize,
    pub avg_length: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Datetime(DatetimeSummary),
    Text(TextSummary),
}

/// A typed view of one column. Derived from RawTable, read-only afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypedColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub null_count: usize,
    pub non_null_count: usize,
    pub summary: ColumnSummary,
}

/// The typed table: per-column metadata plus a polars frame with one typed
/// series per column (Float64 for numeric, Int64 epoch seconds for datetime,
/// String otherwise).
#[derive(Clone, Debug)]
pub struct TypedTable {
    pub df: DataFrame,
    pub columns: Vec<TypedColumn>,
    pub row_count: usize,
}

impl TypedTable {
    pub fn column(&self, name: &str) -> Option<&TypedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric columns with at least one non-null value, in table order.
    pub fn numeric_columns(&self) -> Vec<&TypedColumn> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric && c.non_null_count > 0)
            .collect()
    }

    pub fn first_datetime_column(&self) -> Option<&TypedColumn> {
        self.columns
            .iter()
            .find(|c| c.kind == ColumnKind::Datetime && c.non_null_count > 0)
    }
}

/// Schema detection configuration. Defaults follow the shipped behavior; every
/// threshold is tunable.
#[derive(Clone, Debug)]
pub struct SchemaDetector {
    pub sample_rows: usize,
    pub coercion_threshold: f64,
    pub max_categorical_cardinality: usize,
    pub max_categorical_ratio: f64,
    pub top_value_count: usize,
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self {
            sample_rows: 200,
            coercion_threshold: 0.95,
            max_categorical_cardinality: 50,
            max_categorical_ratio: 0.5,
            top_value_count: 5,
        }
    }
}

impl SchemaDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    pub fn with_coercion_threshold(mut self, threshold: f64) -> Self {
        self.coercion_threshold = threshold;
        self
    }

    /// Infer column kinds and materialise the typed table.
    pub fn detect(&self, raw: &RawTable) -> Result<TypedTable> {
        self.validate_headers(&raw.headers)?;

        let mut series_vec: Vec<Series> = Vec::with_capacity(raw.headers.len());
        let mut columns: Vec<TypedColumn> = Vec::with_capacity(raw.headers.len());

        for header in &raw.headers {
            let cells: Vec<Option<&str>> = raw
                .rows
                .iter()
                .map(|row| match row.get(header) {
                    Some(Value::String(s)) => Some(s.as_str()),
                    _ => None,
                })
                .collect();

            let kind = self.infer_kind(&cells);
            let (series, column) = self.materialise(header, kind, &cells)?;
            series_vec.push(series);
            columns.push(column);
        }

        let df = DataFrame::new(series_vec)
            .map_err(|e| StoryError::Polars(format!("failed to assemble typed table: {e}")))?;

        Ok(TypedTable {
            df,
            columns,
            row_count: raw.row_count(),
        })
    }

    fn validate_headers(&self, headers: &[String]) -> Result<()> {
        let mut seen = HashSet::new();
        for header in headers {
            if header.is_empty() {
                return Err(StoryError::SchemaInference(
                    "empty column name in header row".to_string(),
                ));
            }
            if !seen.insert(header.as_str()) {
                return Err(StoryError::SchemaInference(format!(
                    "duplicate column name '{header}' in header row"
                )));
            }
        }
        Ok(())
    }

    fn infer_kind(&self, cells: &[Option<&str>]) -> ColumnKind {
        let sample: Vec<&str> = cells
            .iter()
            .take(self.sample_rows)
            .filter_map(|c| *c)
            .collect();
        if sample.is_empty() {
            return ColumnKind::Text;
        }

        let total = sample.len() as f64;
        let numeric_ok = sample.iter().filter(|s| parse_numeric(s).is_some()).count();
        if numeric_ok as f64 / total >= self.coercion_threshold {
            return ColumnKind::Numeric;
        }

        let datetime_ok = sample
            .iter()
            .filter(|s| parse_datetime(s).is_some())
            .count();
        if datetime_ok as f64 / total >= self.coercion_threshold {
            return ColumnKind::Datetime;
        }

        let distinct: HashSet<&str> = sample.iter().copied().collect();
        if distinct.len() <= self.max_categorical_cardinality
            && (distinct.len() as f64) / total <= self.max_categorical_ratio
        {
            return ColumnKind::Categorical;
        }

        ColumnKind::Text
    }

    fn materialise(
        &self,
        name: &str,
        kind: ColumnKind,
        cells: &[Option<&str>],
    ) -> Result<(Series, TypedColumn)> {
        match kind {
            ColumnKind::Numeric => {
                let values: Vec<Option<f64>> = cells
                    .iter()
                    .map(|c| c.and_then(parse_numeric))
                    .collect();
                let series = Series::new(name, values);
                let ca = series
                    .f64()
                    .map_err(|e| StoryError::Polars(format!("column {name}: {e}")))?;
                let non_null = ca.len() - ca.null_count();
                let summary = ColumnSummary::Numeric(summarize_numeric(ca)?);
                let column = TypedColumn {
                    name: name.to_string(),
                    kind,
                    null_count: ca.null_count(),
                    non_null_count: non_null,
                    summary,
                };
                Ok((series, column))
            }
            ColumnKind::Datetime => {
                let epochs: Vec<Option<i64>> = cells
                    .iter()
                    .map(|c| c.and_then(parse_datetime))
                    .collect();
                let non_null = epochs.iter().filter(|e| e.is_some()).count();
                let summary = ColumnSummary::Datetime(summarize_datetime(&epochs));
                let series = Series::new(name, epochs);
                let column = TypedColumn {
                    name: name.to_string(),
                    kind,
                    null_count: cells.len() - non_null,
                    non_null_count: non_null,
                    summary,
                };
                Ok((series, column))
            }
            ColumnKind::Categorical | ColumnKind::Text => {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|c| c.map(|s| s.to_string()))
                    .collect();
                let non_null = values.iter().filter(|v| v.is_some()).count();
                let summary = if kind == ColumnKind::Categorical {
                    ColumnSummary::Categorical(self.summarize_categorical(&values))
                } else {
                    ColumnSummary::Text(summarize_text(&values))
                };
                let series = Series::new(name, values);
                let column = TypedColumn {
                    name: name.to_string(),
                    kind,
                    null_count: cells.len() - non_null,
                    non_null_count: non_null,
                    summary,
                };
                Ok((series, column))
            }
        }
    }

    fn summarize_categorical(&self, values: &[Option<String>]) -> CategoricalSummary {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values.iter().flatten() {
            *counts.entry(value.as_str()).or_insert(0) += 1;
        }
        let cardinality = counts.len();
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top_values = ranked
            .into_iter()
            .take(self.top_value_count)
            .map(|(value, count)| TopValue {
                value: value.to_string(),
                count,
            })
            .collect();
        CategoricalSummary {
            cardinality,
            top_values,
        }
    }
}

/// Kind-appropriate stats for a numeric series.
pub(crate) fn summarize_numeric(ca: &Float64Chunked) -> Result<NumericSummary> {
    let quantile = |q: f64| -> Result<f64> {
        Ok(ca
            .quantile(q, QuantileInterpolOptions::Linear)
            .map_err(|e| StoryError::Polars(format!("quantile failed: {e}")))?
            .unwrap_or(0.0))
    };
    Ok(NumericSummary {
        min: ca.min().unwrap_or(0.0),
        max: ca.max().unwrap_or(0.0),
        mean: ca.mean().unwrap_or(0.0),
        std: ca.std(1).unwrap_or(0.0),
        q1: quantile(0.25)?,
        median: ca.median().unwrap_or(0.0),
        q3: quantile(0.75)?,
    })
}

fn summarize_datetime(epochs: &[Option<i64>]) -> DatetimeSummary {
    let mut values: Vec<i64> = epochs.iter().flatten().copied().collect();
    values.sort_unstable();
    values.dedup();

    let min = values.first().copied().unwrap_or(0);
    let max = values.last().copied().unwrap_or(0);

    let granularity = if values.iter().any(|e| e % 86_400 != 0) {
        "timestamp".to_string()
    } else {
        let min_gap = values
            .windows(2)
            .map(|w| w[1] - w[0])
            .min()
            .unwrap_or(86_400);
        match min_gap / 86_400 {
            g if g >= 360 => "yearly".to_string(),
            g if g >= 28 => "monthly".to_string(),
            g if g >= 7 => "weekly".to_string(),
            _ => "daily".to_string(),
        }
    };

    DatetimeSummary {
        min: epoch_to_iso(min),
        max: epoch_to_iso(max),
        granularity,
    }
}

fn summarize_text(values: &[Option<String>]) -> TextSummary {
    let non_null: Vec<&String> = values.iter().flatten().collect();
    let distinct: HashSet<&str> = non_null.iter().map(|s| s.as_str()).collect();
    let avg_length = if non_null.is_empty() {
        0.0
    } else {
        non_null.iter().map(|s| s.chars().count()).sum::<usize>() as f64
            / non_null.len() as f64
    };
    TextSummary {
        distinct: distinct.len(),
        avg_length,
    }
}

pub(crate) fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        if v.is_finite() {
            return Some(v);
        }
        return None;
    }
    if THOUSANDS_RE.is_match(trimmed) {
        return trimmed.replace(',', "").parse::<f64>().ok();
    }
    None
}

pub(crate) fn parse_datetime(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Some(dt.and_utc().timestamp());
            }
        }
    }
    None
}

fn epoch_to_iso(epoch: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch, 0) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => epoch.to_string(),
    }
}
