//! Boundary checks for configuration values and submitted answers.
//!
//! The state container itself never validates; these run where untrusted
//! input enters (loader options, data attributes, the HTTP API).

use crate::types::{AnswerValue, Question, QuestionKind, WidgetConfig};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap());
static NAMED_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z]{3,32}$").unwrap());
static CSS_LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?(?:px|rem|em|pt|%)$").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid color for {field}: {value:?}")]
    Color { field: &'static str, value: String },
    #[error("invalid font size: {0:?}")]
    FontSize(String),
    #[error("font family must not be empty")]
    FontFamily,
    #[error("invalid url for {field}: {value:?}")]
    Url { field: &'static str, value: String },
    #[error("maxQuestionsBeforeSolution must be at least 1")]
    Threshold,
}

#[derive(Debug, Error, PartialEq)]
pub enum AnswerError {
    #[error("question {0} requires an answer")]
    Required(String),
    #[error("{value:?} is not an option of question {question}")]
    UnknownOption { question: String, value: String },
    #[error("question {0} expects a number")]
    NotNumeric(String),
    #[error("{value} is outside [{min:?}, {max:?}] for question {question}")]
    OutOfRange {
        question: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    #[error("answer to {question} does not match {pattern:?}")]
    Pattern { question: String, pattern: String },
    #[error("question {question} has an invalid pattern: {reason}")]
    BadPattern { question: String, reason: String },
}

pub fn check_color(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if HEX_COLOR.is_match(value) || NAMED_COLOR.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::Color {
            field,
            value: value.to_string(),
        })
    }
}

pub fn check_font_size(value: &str) -> Result<(), ConfigError> {
    if CSS_LENGTH.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::FontSize(value.to_string()))
    }
}

/// Absolute http(s) URL.
pub fn check_url(field: &'static str, value: &str) -> Result<url::Url, ConfigError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(parsed),
        _ => Err(ConfigError::Url {
            field,
            value: value.to_string(),
        }),
    }
}

/// Logos may also be served from the widget origin as a rooted path.
pub fn check_logo(value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') && !value.starts_with("//") {
        return Ok(());
    }
    check_url("logoUrl", value).map(|_| ())
}

pub fn validate_config(config: &WidgetConfig) -> Result<(), ConfigError> {
    check_color("primaryColor", &config.primary_color)?;
    check_color("secondaryColor", &config.secondary_color)?;
    if config.font_family.trim().is_empty() {
        return Err(ConfigError::FontFamily);
    }
    check_font_size(&config.font_size)?;
    if let Some(logo) = &config.logo_url {
        check_logo(logo)?;
    }
    if config.max_questions_before_solution == 0 {
        return Err(ConfigError::Threshold);
    }
    Ok(())
}

/// Check a submitted value against the question it answers.
pub fn check_answer(question: &Question, value: &AnswerValue) -> Result<(), AnswerError> {
    let blank = matches!(value, AnswerValue::Text(s) if s.trim().is_empty());
    if blank {
        return if question.required {
            Err(AnswerError::Required(question.id.clone()))
        } else {
            Ok(())
        };
    }

    match question.kind {
        QuestionKind::TextChoices | QuestionKind::ImageChoices if !question.options.is_empty() => {
            let text = value.to_string();
            if !question.options.iter().any(|opt| opt.id == text) {
                return Err(AnswerError::UnknownOption {
                    question: question.id.clone(),
                    value: text,
                });
            }
        }
        QuestionKind::Numeric => {
            let Some(number) = value.as_number().filter(|n| n.is_finite()) else {
                return Err(AnswerError::NotNumeric(question.id.clone()));
            };
            if let Some(rules) = &question.validation {
                let below = rules.min.is_some_and(|min| number < min);
                let above = rules.max.is_some_and(|max| number > max);
                if below || above {
                    return Err(AnswerError::OutOfRange {
                        question: question.id.clone(),
                        value: number,
                        min: rules.min,
                        max: rules.max,
                    });
                }
            }
        }
        _ => {}
    }

    if let Some(pattern) = question
        .validation
        .as_ref()
        .and_then(|rules| rules.pattern.as_deref())
    {
        let re = Regex::new(pattern).map_err(|err| AnswerError::BadPattern {
            question: question.id.clone(),
            reason: err.to_string(),
        })?;
        if !re.is_match(&value.to_string()) {
            return Err(AnswerError::Pattern {
                question: question.id.clone(),
                pattern: pattern.to_string(),
            });
        }
    }
    Ok(())
}
