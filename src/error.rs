use thiserror::Error;

/// Failure modes of the narrative endpoint call, split so the client can
/// decide what is worth retrying.
#[derive(Error, Debug)]
pub enum NarrativeFailure {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by the model endpoint")]
    RateLimited,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("endpoint returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("model returned unparseable text: {0}")]
    MalformedResponse(String),
}

impl NarrativeFailure {
    /// Transient failures are likely to succeed on retry; everything else
    /// surfaces immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            NarrativeFailure::Timeout
            | NarrativeFailure::RateLimited
            | NarrativeFailure::Network(_)
            | NarrativeFailure::MalformedResponse(_) => true,
            NarrativeFailure::Http { status, .. } => *status >= 500,
            NarrativeFailure::Auth(_) | NarrativeFailure::InvalidRequest(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Encoding detection error: no candidate decoded the input (attempted: {})", .attempted.join(", "))]
    EncodingDetection { attempted: Vec<String> },

    #[error("Schema inference error: {0}")]
    SchemaInference(String),

    #[error("Config validation error: {0}")]
    ConfigValidation(String),

    #[error("Response schema error: {reason}")]
    ResponseSchema { reason: String, raw: String },

    #[error("Narrative client error: {0}")]
    NarrativeClient(#[from] NarrativeFailure),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

pub type Result<T> = std::result::Result<T, StoryError>;
