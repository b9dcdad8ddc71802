//! Story types - the narrative contract and its configuration

pub mod config;
pub mod prompt;

pub use config::{Audience, FocusArea, StoryConfig, StoryLength, ValidatedConfig};
pub use prompt::{build_payload, render_question_prompt, render_story_prompt, StoryPayload};

use serde::{Deserialize, Serialize};

/// The narrative object returned by the model. Exactly these keys; anything
/// else fails validation at the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NarrativeResponse {
    pub summary: String,
    pub key_findings: Vec<String>,
    pub action_items: Vec<String>,
}

/// Answer object for the targeted-question flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionAnswer {
    pub answer: String,
    pub explanation: String,
    pub data_points: Vec<String>,
    pub limitations: String,
}
