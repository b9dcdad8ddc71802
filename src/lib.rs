pub mod encoding;
pub mod error;
pub mod ingestion;
pub mod insights;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod story;

pub use error::{NarrativeFailure, Result, StoryError};
pub use ingestion::{RawTable, SchemaDetector, TypedTable};
pub use insights::{ExtractorConfig, InsightExtractor, InsightSummary};
pub use llm::{LlmTransport, NarrativeClient, OpenAiTransport};
pub use pipeline::{extract_insights, DataStoryteller};
pub use retry::RetryPolicy;
pub use story::{NarrativeResponse, QuestionAnswer, StoryConfig};
