//! Ingestion - raw CSV bytes to a typed, analysis-ready table

pub mod clean;
pub mod csv_loader;
pub mod schema_inference;

pub use clean::{clean, CleaningOptions};
pub use csv_loader::{load_raw_table, RawTable};
pub use schema_inference::{
    ColumnKind, ColumnSummary, SchemaDetector, TypedColumn, TypedTable,
};
