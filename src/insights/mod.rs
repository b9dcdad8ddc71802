//! Insight Extraction
//!
//! Turns a typed table into an `InsightSummary` deterministically and without
//! external calls. Three signal families:
//! - Trend: monotonic-direction estimate per numeric column against a time or
//!   index ordering
//! - Outlier: robust z-score flags per numeric column
//! - Correlation: Pearson coefficients for every numeric column pair
//!
//! Degenerate inputs (empty table, all-null columns, no numeric columns) yield
//! an empty summary, which is a valid success.

pub mod correlation;
pub mod outlier;
pub mod trend;

use crate::error::Result;
use crate::ingestion::TypedTable;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

/// Direction and normalized magnitude of a numeric column over its ordering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trend {
    pub column: String,
    pub direction: TrendDirection,
    /// |Pearson r| of (ordering, value), in [0, 1].
    pub magnitude: f64,
    pub slope: f64,
}

/// A flagged row in one numeric column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outlier {
    pub row: usize,
    pub column: String,
    pub value: f64,
    /// Robust z-score; |deviation| exceeded the configured threshold.
    pub deviation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        let abs = r.abs();
        if abs >= 0.9 {
            CorrelationStrength::VeryStrong
        } else if abs >= 0.7 {
            CorrelationStrength::Strong
        } else {
            CorrelationStrength::Moderate
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Correlation {
    pub column_a: String,
    pub column_b: String,
    /// Pearson coefficient, clamped to [-1, 1].
    pub coefficient: f64,
    pub strength: CorrelationStrength,
}

/// Aggregated findings for one table. Ordered lists, stable across runs on the
/// same input.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InsightSummary {
    pub trends: Vec<Trend>,
    pub outliers: Vec<Outlier>,
    pub correlations: Vec<Correlation>,
}

impl InsightSummary {
    pub fn is_empty(&self) -> bool {
        self.trends.is_empty() && self.outliers.is_empty() && self.correlations.is_empty()
    }
}

/// Extraction thresholds. The defaults are reasonable starting points; all of
/// them are tunable per call site.
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Robust z-score above which a row is flagged.
    pub z_score_threshold: f64,
    /// Minimum |Pearson r| for a pair to be reported.
    pub correlation_threshold: f64,
    /// Minimum non-null samples before a trend is computed.
    pub min_trend_samples: usize,
    /// Cap on reported outliers per column, keeping the prompt bounded.
    pub max_outliers_per_column: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 3.0,
            correlation_threshold: 0.5,
            min_trend_samples: 5,
            max_outliers_per_column: 5,
        }
    }
}

pub struct InsightExtractor {
    config: ExtractorConfig,
}

impl InsightExtractor {
    pub fn new() -> Self {
        Self {
            config: ExtractorConfig::default(),
        }
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract all three signal families from a typed table.
    pub fn extract(&self, table: &TypedTable) -> Result<InsightSummary> {
        if table.row_count == 0 {
            return Ok(InsightSummary::default());
        }

        let trends = trend::extract_trends(table, &self.config)?;
        let outliers = outlier::extract_outliers(table, &self.config)?;
        let correlations = correlation::extract_correlations(table, &self.config)?;

        debug!(
            trends = trends.len(),
            outliers = outliers.len(),
            correlations = correlations.len(),
            "insight extraction complete"
        );

        Ok(InsightSummary {
            trends,
            outliers,
            correlations,
        })
    }
}

impl Default for InsightExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-null (index, value) pairs of a numeric column, straight from the typed
/// frame. Row indices are positions in the original data.
pub(crate) fn numeric_values(table: &TypedTable, column: &str) -> Result<Vec<(usize, f64)>> {
    let series = table
        .df
        .column(column)
        .map_err(|e| crate::error::StoryError::Polars(format!("column {column}: {e}")))?;
    let ca = series
        .f64()
        .map_err(|e| crate::error::StoryError::Polars(format!("column {column}: {e}")))?;
    Ok(ca
        .into_iter()
        .enumerate()
        .filter_map(|(idx, v)| v.map(|v| (idx, v)))
        .collect())
}
