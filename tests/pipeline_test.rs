//! End-to-end pipeline tests over a counting fake transport.

use async_trait::async_trait;
use data_storyteller::error::NarrativeFailure;
use data_storyteller::llm::{LlmTransport, NarrativeClient};
use data_storyteller::retry::RetryPolicy;
use data_storyteller::story::StoryConfig;
use data_storyteller::{extract_insights, DataStoryteller, StoryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SALES_CSV: &[u8] = b"date,region,sales,units\n\
2024-01-01,Seoul,100,10\n\
2024-01-02,Busan,110,11\n\
2024-01-03,Seoul,120,12\n\
2024-01-04,Busan,130,13\n\
2024-01-05,Seoul,140,14\n\
2024-01-06,Busan,150,15\n";

const VALID_STORY: &str =
    r#"{"summary": "Sales rose steadily.", "key_findings": ["Up and to the right"], "action_items": ["Keep going"]}"#;

/// Fake transport that counts calls and replays a scripted sequence of
/// responses, then repeats the last entry.
struct CountingTransport {
    responses: Vec<Result<String, ()>>,
    calls: AtomicUsize,
}

impl CountingTransport {
    fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: vec![Ok(text.to_string())],
            calls: AtomicUsize::new(0),
        })
    }

    fn scripted(responses: Vec<Result<String, ()>>) -> Arc<Self> {
        Arc::new(Self {
            responses,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmTransport for CountingTransport {
    async fn complete(&self, _prompt: &str) -> Result<String, NarrativeFailure> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .responses
            .get(idx)
            .or_else(|| self.responses.last())
            .expect("scripted transport needs at least one response");
        match entry {
            Ok(text) => Ok(text.clone()),
            Err(()) => Err(NarrativeFailure::Auth("scripted auth failure".to_string())),
        }
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2), 2.0)
}

fn pipeline(transport: Arc<CountingTransport>) -> DataStoryteller {
    DataStoryteller::new(NarrativeClient::new(transport).with_retry_policy(fast_retry()))
}

#[tokio::test]
async fn test_generate_story_end_to_end() {
    let transport = CountingTransport::ok(VALID_STORY);
    let config = StoryConfig::new("executive", vec!["trend".to_string()], "short");

    let story = pipeline(transport.clone())
        .generate_story(SALES_CSV, &config)
        .await
        .unwrap();

    assert_eq!(story.summary, "Sales rose steadily.");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_invalid_audience_fails_before_any_transport_call() {
    let transport = CountingTransport::ok(VALID_STORY);
    let config = StoryConfig::new("unknown", vec![], "short");

    let err = pipeline(transport.clone())
        .generate_story(SALES_CSV, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, StoryError::ConfigValidation(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_retry_until_success_takes_three_attempts() {
    let transport = CountingTransport::scripted(vec![
        Ok("not json at all".to_string()),
        Ok("{ broken".to_string()),
        Ok(VALID_STORY.to_string()),
    ]);
    let config = StoryConfig::new("general", vec![], "medium");

    let story = pipeline(transport.clone())
        .generate_story(SALES_CSV, &config)
        .await
        .unwrap();

    assert_eq!(story.key_findings.len(), 1);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_auth_failure_surfaces_after_one_attempt() {
    let transport = CountingTransport::scripted(vec![Err(())]);
    let config = StoryConfig::new("general", vec![], "medium");

    let err = pipeline(transport.clone())
        .generate_story(SALES_CSV, &config)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoryError::NarrativeClient(NarrativeFailure::Auth(_))
    ));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_answer_question_end_to_end() {
    let transport = CountingTransport::ok(
        r#"{"answer": "Seoul", "explanation": "Higher totals", "data_points": ["d"], "limitations": "small sample"}"#,
    );

    let answer = pipeline(transport.clone())
        .answer_question(SALES_CSV, "Which region sells more?")
        .await
        .unwrap();

    assert_eq!(answer.answer, "Seoul");
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn test_extract_insights_finds_trend_and_correlation() {
    let summary = extract_insights(SALES_CSV).unwrap();

    // sales and units both rise over the date column and track each other
    // perfectly.
    assert_eq!(summary.trends.len(), 2);
    assert!(summary
        .trends
        .iter()
        .all(|t| t.direction == data_storyteller::insights::TrendDirection::Rising));
    assert_eq!(summary.correlations.len(), 1);
    assert!((summary.correlations[0].coefficient - 1.0).abs() < 1e-9);
    assert!(summary.outliers.is_empty());
}

#[test]
fn test_extract_insights_cp949_bytes() {
    let content = "지역,판매액\n서울,100\n부산,110\n서울,120\n부산,130\n서울,140\n";
    let (encoded, _, had_errors) = encoding_rs::EUC_KR.encode(content);
    assert!(!had_errors);

    let summary = extract_insights(&encoded).unwrap();
    assert_eq!(summary.trends.len(), 1);
    assert_eq!(summary.trends[0].column, "판매액");
}

#[test]
fn test_extract_insights_empty_input_table() {
    let summary = extract_insights(b"a,b\n").unwrap();
    assert!(summary.is_empty());
}
