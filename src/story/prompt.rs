//! Prompt Builder
//!
//! Serialises an InsightSummary plus validated StoryConfig into the payload
//! the narrative client sends, and renders the model prompt from it. Pure:
//! the same (insights, config) pair always yields the same payload and the
//! same prompt text. Request identifiers for tracing live outside this module
//! and never influence content.

use crate::error::Result;
use crate::insights::InsightSummary;
use crate::story::config::{Audience, FocusArea, StoryConfig, StoryLength};
use serde::{Deserialize, Serialize};

/// The model-input contract. Field names and nesting are stable; the model's
/// behavior was tuned against this shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoryPayload {
    pub insights: InsightSummary,
    pub audience: String,
    pub focus_areas: Vec<String>,
    pub length: String,
}

/// Validate the config at this boundary and assemble the payload. Invalid
/// config fails here, before any client involvement.
pub fn build_payload(insights: &InsightSummary, config: &StoryConfig) -> Result<StoryPayload> {
    let validated = config.validate()?;
    Ok(StoryPayload {
        insights: insights.clone(),
        audience: validated.audience.label().to_string(),
        focus_areas: validated
            .focus_areas
            .iter()
            .map(|f| f.label().to_string())
            .collect(),
        length: validated.length.label().to_string(),
    })
}

/// Render the full story prompt from a payload.
pub fn render_story_prompt(payload: &StoryPayload) -> Result<String> {
    let audience = Audience::parse(&payload.audience)?;
    let length = StoryLength::parse(&payload.length)?;
    let focus_areas = payload
        .focus_areas
        .iter()
        .map(|f| FocusArea::parse(f))
        .collect::<Result<Vec<_>>>()?;

    let insights_json = serde_json::to_string_pretty(&payload.insights)?;

    let prompt = format!(
        r#"You are a data analysis and storytelling expert. Analyze the findings below and write an insightful data story for a {audience_label} audience.

## Target audience:
{audience_block}

## Analysis focus:
{focus_block}

## Desired story length:
{length_block}

## Extracted findings:
```json
{insights_json}
```

Return JSON in this exact format:
{{
  "summary": "One cohesive paragraph telling the overall story of the data",
  "key_findings": ["Finding 1", "Finding 2"],
  "action_items": ["Action 1", "Action 2"]
}}

Only return the JSON, no other text. key_findings should contain 3-5 entries grounded in the findings above; action_items should contain 2-4 concrete, data-backed recommendations. Refer only to columns that appear in the findings."#,
        audience_label = audience.label(),
        audience_block = audience_characteristics(audience),
        focus_block = focus_instructions(&focus_areas),
        length_block = length_instructions(length),
    );

    Ok(prompt)
}

/// Render the targeted-question prompt: same findings, a single user question,
/// and the question-answer response contract.
pub fn render_question_prompt(insights: &InsightSummary, question: &str) -> Result<String> {
    let insights_json = serde_json::to_string_pretty(insights)?;

    Ok(format!(
        r#"You are a data analysis expert. Answer the user's question using only the extracted findings below.

## User question:
{question}

## Extracted findings:
```json
{insights_json}
```

Return JSON in this exact format:
{{
  "answer": "Direct answer to the question",
  "explanation": "Detailed reasoning behind the answer",
  "data_points": ["Supporting data point 1", "Supporting data point 2"],
  "limitations": "Limitations or caveats of this analysis"
}}

Only return the JSON, no other text. If the findings cannot fully answer the question, say so clearly in limitations."#
    ))
}

fn audience_characteristics(audience: Audience) -> &'static str {
    match audience {
        Audience::Executive => {
            "Business decision-makers interested in core business impact and strategic insight. \
             They prefer business value and actionable insight over technical detail."
        }
        Audience::Marketing => {
            "Marketing professionals interested in customer behavior, segments, campaign \
             performance and market trends. They prefer strategic marketing insight."
        }
        Audience::Technical => {
            "Data and engineering specialists interested in deep analysis and technical detail. \
             They appreciate statistical significance, methodology and data-quality notes."
        }
        Audience::General => {
            "Readers without data-analysis expertise. They prefer everyday language over \
             technical jargon and want insights explained plainly."
        }
    }
}

fn focus_instructions(focus_areas: &[FocusArea]) -> String {
    if focus_areas.is_empty() {
        return "Derive comprehensive, business-relevant insights across all signal types \
                and propose possible action items."
            .to_string();
    }
    focus_areas
        .iter()
        .map(|f| match f {
            FocusArea::Trend => {
                "Identify and explain the main trends: changes over time, growth or decline \
                 patterns, recurring cycles."
            }
            FocusArea::Outlier => {
                "Identify and explain unusual patterns, outliers, unexpected values and areas \
                 that deserve special attention."
            }
            FocusArea::Correlation => {
                "Analyze relationships between variables: correlations and plausible causal \
                 hypotheses, clearly labelled as hypotheses."
            }
            FocusArea::Action => {
                "Derive business-relevant conclusions and propose concrete action items \
                 grounded in the data."
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn length_instructions(length: StoryLength) -> &'static str {
    match length {
        StoryLength::Short => {
            "Summarize only the core points concisely. Keep the whole response to 3-4 main \
             insights with short explanations."
        }
        StoryLength::Medium => {
            "Explain the main insights and their meaning in a balanced way, with a moderate \
             amount of detail and examples."
        }
        StoryLength::Long => {
            "Provide in-depth analysis of the insights with varied examples, detailed \
             explanations and additional context."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{Correlation, CorrelationStrength, InsightSummary};
    use crate::story::config::StoryConfig;

    fn sample_insights() -> InsightSummary {
        InsightSummary {
            trends: vec![],
            outliers: vec![],
            correlations: vec![Correlation {
                column_a: "clicks".to_string(),
                column_b: "conversions".to_string(),
                coefficient: 0.91,
                strength: CorrelationStrength::VeryStrong,
            }],
        }
    }

    #[test]
    fn test_payload_shape_is_stable() {
        let config = StoryConfig::new("executive", vec!["trend".to_string()], "short");
        let payload = build_payload(&sample_insights(), &config).unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert!(json.get("insights").is_some());
        assert!(json["insights"].get("trends").is_some());
        assert!(json["insights"].get("outliers").is_some());
        assert!(json["insights"].get("correlations").is_some());
        assert_eq!(json["audience"], "executive");
        assert_eq!(json["focus_areas"][0], "trend");
        assert_eq!(json["length"], "short");
    }

    #[test]
    fn test_invalid_config_fails_before_rendering() {
        let config = StoryConfig::new("unknown", vec![], "short");
        assert!(build_payload(&sample_insights(), &config).is_err());
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let config = StoryConfig::new("technical", vec!["correlation".to_string()], "long");
        let payload = build_payload(&sample_insights(), &config).unwrap();
        let first = render_story_prompt(&payload).unwrap();
        let second = render_story_prompt(&payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prompt_mentions_findings_and_contract() {
        let config = StoryConfig::new("marketing", vec![], "medium");
        let payload = build_payload(&sample_insights(), &config).unwrap();
        let prompt = render_story_prompt(&payload).unwrap();
        assert!(prompt.contains("clicks"));
        assert!(prompt.contains("key_findings"));
        assert!(prompt.contains("action_items"));
        assert!(prompt.contains("Marketing professionals"));
    }

    #[test]
    fn test_audience_templates_differ() {
        let insights = sample_insights();
        let mut prompts = Vec::new();
        for audience in ["executive", "marketing", "technical", "general"] {
            let config = StoryConfig::new(audience, vec![], "medium");
            let payload = build_payload(&insights, &config).unwrap();
            prompts.push(render_story_prompt(&payload).unwrap());
        }
        for i in 0..prompts.len() {
            for j in i + 1..prompts.len() {
                assert_ne!(prompts[i], prompts[j]);
            }
        }
    }

    #[test]
    fn test_question_prompt_contains_contract() {
        let prompt =
            render_question_prompt(&sample_insights(), "Which channel converts best?").unwrap();
        assert!(prompt.contains("Which channel converts best?"));
        assert!(prompt.contains("data_points"));
        assert!(prompt.contains("limitations"));
    }
}
