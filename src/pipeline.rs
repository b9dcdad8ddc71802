//! Pipeline - the caller-facing facade
//!
//! One sequential flow per invocation: decode -> type -> extract -> build
//! prompt -> call model -> validate. Each run works on its own table and
//! summary instances; nothing is shared or cached between runs. Dropping the
//! returned future cancels the in-flight model call along with its retry
//! state.

use crate::error::Result;
use crate::ingestion::{clean, load_raw_table, CleaningOptions, SchemaDetector, TypedTable};
use crate::insights::{InsightExtractor, InsightSummary};
use crate::llm::NarrativeClient;
use crate::story::{
    build_payload, render_question_prompt, render_story_prompt, NarrativeResponse,
    QuestionAnswer, StoryConfig,
};
use tracing::info;
use uuid::Uuid;

/// The assembled pipeline. The narrative client (and with it the credential)
/// is injected by the caller; detection, cleaning and extraction settings have
/// working defaults.
pub struct DataStoryteller {
    detector: SchemaDetector,
    cleaning: CleaningOptions,
    extractor: InsightExtractor,
    client: NarrativeClient,
}

impl DataStoryteller {
    pub fn new(client: NarrativeClient) -> Self {
        Self {
            detector: SchemaDetector::default(),
            cleaning: CleaningOptions::default(),
            extractor: InsightExtractor::default(),
            client,
        }
    }

    pub fn with_detector(mut self, detector: SchemaDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_cleaning(mut self, cleaning: CleaningOptions) -> Self {
        self.cleaning = cleaning;
        self
    }

    pub fn with_extractor(mut self, extractor: InsightExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Full pipeline: CSV bytes in, validated narrative out.
    pub async fn generate_story(
        &self,
        raw_bytes: &[u8],
        config: &StoryConfig,
    ) -> Result<NarrativeResponse> {
        let request_id = Uuid::new_v4().to_string();
        let table = self.typed_table(raw_bytes)?;
        let insights = self.extractor.extract(&table)?;

        // Config validation happens inside the builder, before any transport
        // involvement.
        let payload = build_payload(&insights, config)?;
        let prompt = render_story_prompt(&payload)?;

        info!(
            request_id = %request_id,
            rows = table.row_count,
            columns = table.columns.len(),
            "requesting data story"
        );
        self.client.generate(&prompt, &request_id).await
    }

    /// Analysis without narrative generation.
    pub fn extract_insights(&self, raw_bytes: &[u8]) -> Result<InsightSummary> {
        let table = self.typed_table(raw_bytes)?;
        self.extractor.extract(&table)
    }

    /// Targeted question over the extracted findings.
    pub async fn answer_question(
        &self,
        raw_bytes: &[u8],
        question: &str,
    ) -> Result<QuestionAnswer> {
        let request_id = Uuid::new_v4().to_string();
        let table = self.typed_table(raw_bytes)?;
        let insights = self.extractor.extract(&table)?;
        let prompt = render_question_prompt(&insights, question)?;

        info!(request_id = %request_id, rows = table.row_count, "requesting question answer");
        self.client.ask(&prompt, &request_id).await
    }

    /// The typed table for a byte stream, for callers that want the summary
    /// frames as well as the insights.
    pub fn typed_table(&self, raw_bytes: &[u8]) -> Result<TypedTable> {
        let raw = load_raw_table(raw_bytes)?;
        info!(
            rows = raw.row_count(),
            encoding = raw.encoding.label(),
            "loaded raw table"
        );
        let table = self.detector.detect(&raw)?;
        clean(&table, &self.cleaning)
    }
}

/// Analysis-only entry point with default settings, for callers that never
/// touch the narrative side and therefore have no client to inject.
pub fn extract_insights(raw_bytes: &[u8]) -> Result<InsightSummary> {
    let raw = load_raw_table(raw_bytes)?;
    let table = SchemaDetector::default().detect(&raw)?;
    InsightExtractor::default().extract(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_insights_empty_table() {
        let summary = extract_insights(b"a,b\n").unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_extract_insights_score_scenario() {
        let summary = extract_insights(b"name,score\nA,10\nB,12\nC,100\n").unwrap();
        assert_eq!(summary.outliers.len(), 1);
        assert_eq!(summary.outliers[0].row, 2);
        assert!(summary.correlations.is_empty());
    }

    #[test]
    fn test_runs_are_independent() {
        let first = extract_insights(b"x,y\n1,2\n2,4\n3,6\n4,8\n5,10\n").unwrap();
        let second = extract_insights(b"a\n1\n1\n1\n").unwrap();
        assert_eq!(first.correlations.len(), 1);
        assert!(second.correlations.is_empty());
    }
}
