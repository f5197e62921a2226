//! Window messages exchanged between the host page and the widget iframe.
//!
//! Both directions are closed enums serialized as `{"type": ..., "data": ...}`.
//! Inbound messages are origin-checked before their shape is looked at.

use crate::types::{Feedback, WidgetConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Host page → iframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum HostMessage {
    Init(WidgetConfig),
}

/// Iframe → host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum WidgetMessage {
    WidgetClose,
    WidgetReady,
    FeedbackSubmitted(Feedback),
}

impl WidgetMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetMessage::WidgetClose => "widget-close",
            WidgetMessage::WidgetReady => "widget-ready",
            WidgetMessage::FeedbackSubmitted(_) => "feedback-submitted",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("message from unexpected origin {origin:?} (expected {expected:?})")]
    OriginRejected { origin: String, expected: String },
    #[error("malformed widget message: {0}")]
    Malformed(String),
}

/// Compare origins the way `MessageEvent.origin` reports them: scheme,
/// host and port, no path and no trailing slash.
pub fn normalize_origin(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => raw.trim_end_matches('/').to_string(),
    }
}

pub fn decode_widget_message(
    expected_origin: &str,
    origin: &str,
    data: &Value,
) -> Result<WidgetMessage, ProtocolError> {
    let expected = normalize_origin(expected_origin);
    if normalize_origin(origin) != expected {
        debug!(%origin, %expected, "dropping message from foreign origin");
        return Err(ProtocolError::OriginRejected {
            origin: origin.to_string(),
            expected,
        });
    }
    WidgetMessage::deserialize(data).map_err(|err| {
        let kind = data.get("type").and_then(Value::as_str).unwrap_or("<none>");
        debug!(%kind, %err, "dropping malformed widget message");
        ProtocolError::Malformed(format!("type {kind:?}: {err}"))
    })
}

pub fn encode_host_message(message: &HostMessage) -> Value {
    // Serializing a closed enum of plain data cannot fail.
    serde_json::to_value(message).unwrap_or(Value::Null)
}
