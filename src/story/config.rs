//! Story configuration - caller-supplied options validated against the
//! enumerated sets before any payload is built

use crate::error::{Result, StoryError};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Executive,
    Marketing,
    Technical,
    General,
}

impl Audience {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "executive" => Ok(Audience::Executive),
            "marketing" => Ok(Audience::Marketing),
            "technical" => Ok(Audience::Technical),
            "general" => Ok(Audience::General),
            other => Err(StoryError::ConfigValidation(format!(
                "unknown audience '{other}' (expected executive, marketing, technical or general)"
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Audience::Executive => "executive",
            Audience::Marketing => "marketing",
            Audience::Technical => "technical",
            Audience::General => "general",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    Trend,
    Outlier,
    Correlation,
    Action,
}

impl FocusArea {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trend" => Ok(FocusArea::Trend),
            "outlier" => Ok(FocusArea::Outlier),
            "correlation" => Ok(FocusArea::Correlation),
            "action" => Ok(FocusArea::Action),
            other => Err(StoryError::ConfigValidation(format!(
                "unknown focus area '{other}' (expected trend, outlier, correlation or action)"
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FocusArea::Trend => "trend",
            FocusArea::Outlier => "outlier",
            FocusArea::Correlation => "correlation",
            FocusArea::Action => "action",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryLength {
    Short,
    Medium,
    Long,
}

impl StoryLength {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(StoryLength::Short),
            "medium" => Ok(StoryLength::Medium),
            "long" => Ok(StoryLength::Long),
            other => Err(StoryError::ConfigValidation(format!(
                "unknown length '{other}' (expected short, medium or long)"
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StoryLength::Short => "short",
            StoryLength::Medium => "medium",
            StoryLength::Long => "long",
        }
    }
}

/// Raw configuration as supplied by the UI collaborator. Kept as strings so
/// invalid values can exist long enough to be rejected at the builder boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoryConfig {
    pub audience: String,
    /// Subset of {trend, outlier, correlation, action}. Empty means a
    /// comprehensive story.
    #[serde(default)]
    pub focus_areas: Vec<String>,
    pub length: String,
}

impl StoryConfig {
    pub fn new(
        audience: impl Into<String>,
        focus_areas: Vec<String>,
        length: impl Into<String>,
    ) -> Self {
        Self {
            audience: audience.into(),
            focus_areas,
            length: length.into(),
        }
    }

    /// Validate every field against its enumerated set, failing fast on the
    /// first offender. Duplicate focus areas collapse, preserving first
    /// occurrence order.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let audience = Audience::parse(&self.audience)?;
        let length = StoryLength::parse(&self.length)?;

        let mut focus_areas = Vec::new();
        for raw in &self.focus_areas {
            let focus = FocusArea::parse(raw)?;
            if !focus_areas.contains(&focus) {
                focus_areas.push(focus);
            }
        }

        Ok(ValidatedConfig {
            audience,
            focus_areas,
            length,
        })
    }
}

/// Configuration after boundary validation; the only form the prompt builder
/// accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub audience: Audience,
    pub focus_areas: Vec<FocusArea>,
    pub length: StoryLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = StoryConfig::new(
            "executive",
            vec!["trend".to_string(), "outlier".to_string()],
            "short",
        );
        let validated = config.validate().unwrap();
        assert_eq!(validated.audience, Audience::Executive);
        assert_eq!(
            validated.focus_areas,
            vec![FocusArea::Trend, FocusArea::Outlier]
        );
        assert_eq!(validated.length, StoryLength::Short);
    }

    #[test]
    fn test_unknown_audience_rejected() {
        let config = StoryConfig::new("unknown", vec![], "short");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StoryError::ConfigValidation(_)));
    }

    #[test]
    fn test_unknown_focus_rejected() {
        let config = StoryConfig::new("general", vec!["vibes".to_string()], "medium");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_length_rejected() {
        let config = StoryConfig::new("general", vec![], "epic");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_case_insensitive_and_trimmed() {
        let config = StoryConfig::new(" Executive ", vec!["TREND".to_string()], "Long");
        let validated = config.validate().unwrap();
        assert_eq!(validated.audience, Audience::Executive);
        assert_eq!(validated.length, StoryLength::Long);
    }

    #[test]
    fn test_duplicate_focus_collapsed() {
        let config = StoryConfig::new(
            "general",
            vec!["trend".to_string(), "trend".to_string()],
            "medium",
        );
        let validated = config.validate().unwrap();
        assert_eq!(validated.focus_areas, vec![FocusArea::Trend]);
    }

    #[test]
    fn test_empty_focus_is_valid() {
        let config = StoryConfig::new("general", vec![], "medium");
        assert!(config.validate().unwrap().focus_areas.is_empty());
    }
}
