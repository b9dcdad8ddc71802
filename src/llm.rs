//! Narrative Client
//!
//! Sends the builder's prompt to the external language-model endpoint and
//! returns a validated response object. The HTTP transport sits behind a trait
//! so tests can substitute counting fakes; the production transport targets an
//! OpenAI-compatible chat-completions endpoint.
//!
//! Failure handling:
//! - transient failures (timeout, rate limit, 5xx, unparseable response text)
//!   are retried with exponential backoff up to the policy's attempt bound
//! - fatal failures (auth, invalid request) surface immediately
//! - valid JSON that violates the output contract is a `ResponseSchema` error
//!   and is never retried: a deterministic bad shape will not improve on retry

use crate::error::{NarrativeFailure, Result, StoryError};
use crate::retry::RetryPolicy;
use crate::story::{NarrativeResponse, QuestionAnswer};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport seam: anything that can turn a prompt into response text.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, NarrativeFailure>;
}

/// Production transport for OpenAI-compatible chat-completion endpoints. The
/// credential is passed in explicitly; there is no ambient lookup here.
pub struct OpenAiTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTransport {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoryError::NarrativeClient(NarrativeFailure::Network(e.to_string())))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn classify_status(status: u16, message: String) -> NarrativeFailure {
        match status {
            401 | 403 => NarrativeFailure::Auth(message),
            400 | 404 | 422 => NarrativeFailure::InvalidRequest(message),
            429 => NarrativeFailure::RateLimited,
            _ => NarrativeFailure::Http { status, message },
        }
    }
}

#[async_trait]
impl LlmTransport for OpenAiTransport {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, NarrativeFailure> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a precise JSON-only responder. Always return valid JSON, no other text."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.7
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NarrativeFailure::Timeout
                } else {
                    NarrativeFailure::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| NarrativeFailure::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(Self::classify_status(status, text));
        }

        let envelope: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| NarrativeFailure::MalformedResponse(e.to_string()))?;
        envelope["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                NarrativeFailure::MalformedResponse("no content in completion envelope".to_string())
            })
    }
}

/// The narrative client: transport plus retry policy, yielding fully validated
/// response objects or typed errors. Never a partial result.
pub struct NarrativeClient {
    transport: Arc<dyn LlmTransport>,
    retry: RetryPolicy,
}

impl NarrativeClient {
    pub fn new(transport: Arc<dyn LlmTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate a data story. `request_id` exists for tracing only and never
    /// reaches the prompt or payload.
    pub async fn generate(&self, prompt: &str, request_id: &str) -> Result<NarrativeResponse> {
        self.call_validated(prompt, request_id).await
    }

    /// Answer a targeted question about the findings.
    pub async fn ask(&self, prompt: &str, request_id: &str) -> Result<QuestionAnswer> {
        self.call_validated(prompt, request_id).await
    }

    async fn call_validated<T: DeserializeOwned>(
        &self,
        prompt: &str,
        request_id: &str,
    ) -> Result<T> {
        let mut last_failure: Option<NarrativeFailure> = None;

        for attempt in 0..self.retry.max_attempts {
            match self.transport.complete(prompt).await {
                Ok(text) => match parse_contract::<T>(&text) {
                    Ok(parsed) => {
                        info!(request_id, attempt = attempt + 1, "narrative call succeeded");
                        return Ok(parsed);
                    }
                    Err(ParseFailure::NotJson(reason)) => {
                        warn!(request_id, attempt = attempt + 1, %reason, "unparseable model output");
                        last_failure = Some(NarrativeFailure::MalformedResponse(reason));
                    }
                    Err(ParseFailure::ContractViolation { reason, raw }) => {
                        return Err(StoryError::ResponseSchema { reason, raw });
                    }
                },
                Err(failure) => {
                    if !failure.is_transient() {
                        warn!(request_id, attempt = attempt + 1, %failure, "fatal narrative failure");
                        return Err(StoryError::NarrativeClient(failure));
                    }
                    warn!(request_id, attempt = attempt + 1, %failure, "transient narrative failure");
                    last_failure = Some(failure);
                }
            }

            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }

        Err(StoryError::NarrativeClient(last_failure.unwrap_or(
            NarrativeFailure::Network("no attempts were made".to_string()),
        )))
    }
}

enum ParseFailure {
    /// Not valid JSON at all: retriable, the model may produce valid JSON on
    /// the next attempt.
    NotJson(String),
    /// Valid JSON with the wrong shape: deterministic for the same prompt,
    /// never retried.
    ContractViolation { reason: String, raw: String },
}

/// Strict contract validation. Models occasionally wrap JSON in a markdown
/// fence despite instructions; the fence is stripped before parsing, nothing
/// else is repaired.
fn parse_contract<T: DeserializeOwned>(text: &str) -> std::result::Result<T, ParseFailure> {
    let stripped = strip_code_fence(text.trim());

    let value: serde_json::Value = serde_json::from_str(stripped)
        .map_err(|e| ParseFailure::NotJson(e.to_string()))?;

    serde_json::from_value::<T>(value).map_err(|e| ParseFailure::ContractViolation {
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(|c| c == '\r' || c == '\n');
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counting fake transport that replays a scripted response sequence.
    struct ScriptedTransport {
        responses: Vec<std::result::Result<String, NarrativeFailure>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<std::result::Result<String, NarrativeFailure>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmTransport for ScriptedTransport {
        async fn complete(
            &self,
            _prompt: &str,
        ) -> std::result::Result<String, NarrativeFailure> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(idx) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(failure)) => Err(clone_failure(failure)),
                None => panic!("transport called more times than scripted"),
            }
        }
    }

    fn clone_failure(f: &NarrativeFailure) -> NarrativeFailure {
        match f {
            NarrativeFailure::Timeout => NarrativeFailure::Timeout,
            NarrativeFailure::RateLimited => NarrativeFailure::RateLimited,
            NarrativeFailure::Auth(m) => NarrativeFailure::Auth(m.clone()),
            NarrativeFailure::InvalidRequest(m) => NarrativeFailure::InvalidRequest(m.clone()),
            NarrativeFailure::Http { status, message } => NarrativeFailure::Http {
                status: *status,
                message: message.clone(),
            },
            NarrativeFailure::Network(m) => NarrativeFailure::Network(m.clone()),
            NarrativeFailure::MalformedResponse(m) => {
                NarrativeFailure::MalformedResponse(m.clone())
            }
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(2),
            2.0,
        )
    }

    const VALID: &str = r#"{"summary": "s", "key_findings": ["f"], "action_items": ["a"]}"#;

    #[tokio::test]
    async fn test_valid_response_parsed() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(VALID.to_string())]));
        let client =
            NarrativeClient::new(transport.clone()).with_retry_policy(fast_policy(3));
        let story = client.generate("prompt", "req-1").await.unwrap();
        assert_eq!(story.summary, "s");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_twice_then_valid_takes_three_attempts() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok("this is not json".to_string()),
            Ok("still { not json".to_string()),
            Ok(VALID.to_string()),
        ]));
        let client =
            NarrativeClient::new(transport.clone()).with_retry_policy(fast_policy(3));
        let story = client.generate("prompt", "req-2").await.unwrap();
        assert_eq!(story.key_findings, vec!["f".to_string()]);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(NarrativeFailure::Auth(
            "bad key".to_string(),
        ))]));
        let client =
            NarrativeClient::new(transport.clone()).with_retry_policy(fast_policy(3));
        let err = client.generate("prompt", "req-3").await.unwrap_err();
        assert!(matches!(
            err,
            StoryError::NarrativeClient(NarrativeFailure::Auth(_))
        ));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_contract_violation_not_retried_and_preserves_raw() {
        let raw = r#"{"summary": "s", "key_findings": ["f"], "extra": true}"#;
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(raw.to_string())]));
        let client =
            NarrativeClient::new(transport.clone()).with_retry_policy(fast_policy(3));
        let err = client.generate("prompt", "req-4").await.unwrap_err();
        match err {
            StoryError::ResponseSchema { raw: preserved, .. } => {
                assert_eq!(preserved, raw);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_attempts() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(NarrativeFailure::Timeout),
            Err(NarrativeFailure::RateLimited),
            Err(NarrativeFailure::Timeout),
        ]));
        let client =
            NarrativeClient::new(transport.clone()).with_retry_policy(fast_policy(3));
        let err = client.generate("prompt", "req-5").await.unwrap_err();
        assert!(matches!(err, StoryError::NarrativeClient(_)));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fenced_json_accepted() {
        let fenced = format!("```json\n{VALID}\n```");
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(fenced)]));
        let client = NarrativeClient::new(transport).with_retry_policy(fast_policy(1));
        let story = client.generate("prompt", "req-6").await.unwrap();
        assert_eq!(story.action_items, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_question_contract() {
        let answer =
            r#"{"answer": "x", "explanation": "y", "data_points": ["d"], "limitations": "z"}"#;
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(answer.to_string())]));
        let client = NarrativeClient::new(transport).with_retry_policy(fast_policy(1));
        let qa = client.ask("prompt", "req-7").await.unwrap();
        assert_eq!(qa.answer, "x");
    }
}
