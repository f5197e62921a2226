use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    TextChoices,
    ImageChoices,
    FreeText,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl QuestionOption {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A clarifying question issued by the backend. Never mutated after issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<QuestionValidation>,
}

impl Question {
    pub fn new(id: &str, kind: QuestionKind, title: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            description: None,
            options: Vec::new(),
            required: true,
            validation: None,
        }
    }

    pub fn with_options(mut self, options: Vec<QuestionOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_validation(mut self, validation: QuestionValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Scalar answer payload. Numbers are tried first so `5` stays numeric on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            AnswerValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            AnswerValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// True when the value is a text equal to `expected`.
    pub fn is_text(&self, expected: &str) -> bool {
        self.as_text() == Some(expected)
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(n) => write!(f, "{n}"),
            AnswerValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub value: AnswerValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Answer {
    /// Build an answer stamped with the current time.
    pub fn new(question_id: &str, value: impl Into<AnswerValue>, label: Option<String>) -> Self {
        Self {
            question_id: question_id.to_string(),
            value: value.into(),
            label,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub id: String,
    pub title: String,
    pub description: String,
    pub steps: Vec<String>,
    pub priority: Priority,
}

/// Theming and behavior knobs shared by the loader and the iframe app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: String,
    pub font_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub max_questions_before_solution: usize,
}

pub const DEFAULT_PRIMARY_COLOR: &str = "#9333ea";
pub const DEFAULT_SECONDARY_COLOR: &str = "#f1f5f9";
pub const DEFAULT_FONT_FAMILY: &str = "Inter, sans-serif";
pub const DEFAULT_FONT_SIZE: &str = "16px";
pub const DEFAULT_SOLUTION_THRESHOLD: usize = 3;

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            secondary_color: DEFAULT_SECONDARY_COLOR.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE.to_string(),
            logo_url: None,
            company_name: None,
            max_questions_before_solution: DEFAULT_SOLUTION_THRESHOLD,
        }
    }
}

/// Partial config; present fields overwrite, absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_questions_before_solution: Option<usize>,
}

impl WidgetConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl WidgetConfig {
    pub fn merge(&mut self, patch: WidgetConfigPatch) {
        if let Some(v) = patch.primary_color {
            self.primary_color = v;
        }
        if let Some(v) = patch.secondary_color {
            self.secondary_color = v;
        }
        if let Some(v) = patch.font_family {
            self.font_family = v;
        }
        if let Some(v) = patch.font_size {
            self.font_size = v;
        }
        if let Some(v) = patch.logo_url {
            self.logo_url = Some(v);
        }
        if let Some(v) = patch.company_name {
            self.company_name = Some(v);
        }
        if let Some(v) = patch.max_questions_before_solution {
            self.max_questions_before_solution = v;
        }
    }

    pub fn merged(mut self, patch: WidgetConfigPatch) -> Self {
        self.merge(patch);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
    #[default]
    Problem,
    Questions,
    Review,
    Solution,
    Feedback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// One unanswered question at a time.
    #[default]
    Sequential,
    /// All questions at once.
    Batch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// `None` until the user picks a side.
    pub helpful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Partial feedback. `helpful` distinguishes "absent" from an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPatch {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub helpful: Option<Option<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Feedback {
    pub fn merge(&mut self, patch: FeedbackPatch) {
        if let Some(helpful) = patch.helpful {
            self.helpful = helpful;
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating);
        }
        if let Some(comment) = patch.comment {
            self.comment = Some(comment);
        }
    }
}

impl From<Feedback> for FeedbackPatch {
    fn from(feedback: Feedback) -> Self {
        Self {
            helpful: Some(feedback.helpful),
            rating: feedback.rating,
            comment: feedback.comment,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub current_step: WizardStep,
    pub problem_description: String,
    pub current_questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub current_solution: Option<Solution>,
    pub feedback: Feedback,
    pub display_mode: DisplayMode,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockApiResponse {
    pub questions: Vec<Question>,
    pub solution_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_value_keeps_numbers_numeric() {
        let answer: Answer = serde_json::from_value(json!({
            "questionId": "budget",
            "value": 250,
        }))
        .unwrap();
        assert_eq!(answer.value, AnswerValue::Number(250.0));
        assert_eq!(answer.label, None);

        let answer: Answer = serde_json::from_value(json!({
            "questionId": "urgency",
            "value": "critical",
            "label": "Critical - Immediate attention required",
            "timestamp": "2024-05-01T10:00:00Z",
        }))
        .unwrap();
        assert!(answer.value.is_text("critical"));
    }

    #[test]
    fn question_kind_uses_type_key() {
        let q = Question::new("urgency", QuestionKind::TextChoices, "How urgent?");
        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["type"], "text-choices");
        assert!(value.get("options").is_none());
    }

    #[test]
    fn config_patch_only_overwrites_present_fields() {
        let patch: WidgetConfigPatch = serde_json::from_value(json!({
            "primaryColor": "#000000",
            "maxQuestionsBeforeSolution": 5,
        }))
        .unwrap();
        let merged = WidgetConfig::default().merged(patch);
        assert_eq!(merged.primary_color, "#000000");
        assert_eq!(merged.secondary_color, DEFAULT_SECONDARY_COLOR);
        assert_eq!(merged.max_questions_before_solution, 5);
    }

    #[test]
    fn feedback_patch_distinguishes_null_from_absent() {
        let mut feedback = Feedback {
            helpful: Some(true),
            rating: Some(4),
            comment: None,
        };
        let absent: FeedbackPatch = serde_json::from_value(json!({"comment": "thanks"})).unwrap();
        feedback.merge(absent);
        assert_eq!(feedback.helpful, Some(true));
        assert_eq!(feedback.comment.as_deref(), Some("thanks"));

        let cleared: FeedbackPatch = serde_json::from_value(json!({"helpful": null})).unwrap();
        feedback.merge(cleared);
        assert_eq!(feedback.helpful, None);
        assert_eq!(feedback.rating, Some(4));
    }

    #[test]
    fn priority_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Priority::Critical).unwrap(),
            json!("critical")
        );
        assert!(Priority::Critical > Priority::High);
    }
}
