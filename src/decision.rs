//! Outcome of resolving a bar for one request, and the JSON payload the widget consumes.
use serde::Serialize;

use crate::{
    models::{BarConfig, Message, Presentation, Timestamp},
    variant::{RenderedContent, Variant},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing to render: the account has no servable bar.
    NoBar(NoBarReason),
    /// The bar is live but no message is eligible for this visitor.
    NoMessage { bar: BarSummary },
    Show {
        bar: BarSummary,
        message: ResolvedMessage,
    },
}

impl Decision {
    pub fn message(&self) -> Option<&ResolvedMessage> {
        match self {
            Decision::Show { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Decision::NoBar(_))
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoBarReason {
    #[error("Shop parameter required")]
    MissingAccountKey,
    #[error("Shop not found")]
    UnknownAccount,
    #[error("No active bars")]
    Inactive,
    #[error("Bar outside schedule")]
    OutsideSchedule,
}

/// Bar-level fields sent to the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSummary {
    pub id: i64,
    pub name: String,
    pub rotation_enabled: bool,
    pub rotation_interval: i64,
    #[serde(flatten)]
    pub extra: Presentation,
}

impl From<&BarConfig> for BarSummary {
    fn from(bar: &BarConfig) -> Self {
        BarSummary {
            id: bar.id,
            name: bar.name.clone(),
            rotation_enabled: bar.rotation_enabled,
            rotation_interval: bar.rotation_interval_secs(),
            extra: bar.extra.clone(),
        }
    }
}

/// A message with its variant applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMessage {
    pub id: i64,
    pub variant: Option<Variant>,
    pub text: String,
    pub button_text: String,
    pub button_url: String,
    pub display_order: i64,
    pub countdown_enabled: bool,
    pub countdown_date: Option<Timestamp>,
    pub countdown_text: Option<String>,
    #[serde(flatten)]
    pub presentation: Presentation,
}

impl ResolvedMessage {
    pub(crate) fn new(message: &Message, rendered: RenderedContent) -> Self {
        ResolvedMessage {
            id: message.id,
            variant: rendered.variant,
            text: rendered.text,
            button_text: rendered.button_text,
            button_url: message.button_url.clone(),
            display_order: message.display_order,
            countdown_enabled: message.countdown_enabled,
            countdown_date: message.countdown_date,
            countdown_text: message.countdown_text.clone(),
            presentation: message.presentation.clone(),
        }
    }
}

/// Rendering contract of the embedded widget script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionPayload {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<BarSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ResolvedMessage>,
}

impl DecisionPayload {
    /// Payload for failures outside the engine (e.g., the config store being unavailable).
    pub fn server_error() -> Self {
        DecisionPayload {
            active: false,
            reason: None,
            error: Some("Server error".to_owned()),
            bar: None,
            message: None,
        }
    }
}

impl From<Decision> for DecisionPayload {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::NoBar(reason) => DecisionPayload {
                active: false,
                reason: Some(reason.to_string()),
                error: None,
                bar: None,
                message: None,
            },
            Decision::NoMessage { bar } => DecisionPayload {
                active: true,
                reason: Some("No eligible message".to_owned()),
                error: None,
                bar: Some(bar),
                message: None,
            },
            Decision::Show { bar, message } => DecisionPayload {
                active: true,
                reason: None,
                error: None,
                bar: Some(bar),
                message: Some(message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BarSummary, Decision, DecisionPayload, NoBarReason};
    use crate::models::Presentation;

    #[test]
    fn no_bar_payload() {
        let payload = DecisionPayload::from(Decision::NoBar(NoBarReason::UnknownAccount));
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            serde_json::json!({ "active": false, "reason": "Shop not found" })
        );
    }

    #[test]
    fn no_message_payload_is_active_without_message() {
        let mut extra = Presentation::new();
        extra.insert("bar_position".into(), "top".into());
        let bar = BarSummary {
            id: 7,
            name: "Spring".into(),
            rotation_enabled: true,
            rotation_interval: 5,
            extra,
        };

        let payload = DecisionPayload::from(Decision::NoMessage { bar });
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            serde_json::json!({
                "active": true,
                "reason": "No eligible message",
                "bar": {
                    "id": 7,
                    "name": "Spring",
                    "rotation_enabled": true,
                    "rotation_interval": 5,
                    "bar_position": "top",
                },
            })
        );
    }

    #[test]
    fn server_error_payload() {
        assert_eq!(
            serde_json::to_value(DecisionPayload::server_error()).unwrap(),
            serde_json::json!({ "active": false, "error": "Server error" })
        );
    }
}
