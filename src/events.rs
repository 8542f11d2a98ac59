use serde::{Deserialize, Serialize};

use crate::{
    context::{DeviceType, RequestContext},
    models::Timestamp,
    variant::Variant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Impression,
    Click,
    Close,
}

/// Analytics event about a bar, shaped like a row of the analytics store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    pub bar_id: i64,
    pub message_id: Option<i64>,
    pub event_type: EventType,
    pub variant: Option<Variant>,
    pub device_type: Option<DeviceType>,
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: Timestamp,
}

impl BarEvent {
    pub(crate) fn impression(
        bar_id: i64,
        message_id: i64,
        variant: Option<Variant>,
        ctx: &RequestContext,
    ) -> Self {
        BarEvent {
            bar_id,
            message_id: Some(message_id),
            event_type: EventType::Impression,
            variant,
            device_type: Some(ctx.device_type),
            page_url: Some(ctx.page_url.clone()).filter(|url| !url.is_empty()),
            referrer: None,
            session_id: Some(ctx.session_id.clone()).filter(|id| !id.is_empty()),
            timestamp: ctx.now,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmissionError {
    #[error("event queue is full")]
    QueueFull,
    #[error("event sink is closed")]
    Closed,
}

/// Sink for bar events.
///
/// `record` is called on the request path and must not block: hand the event off (e.g., to a
/// queue) and return. Errors are logged and the event dropped by callers.
pub trait EventEmitter {
    fn record(&self, event: BarEvent) -> Result<(), EmissionError>;
}

pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn record(&self, _event: BarEvent) -> Result<(), EmissionError> {
        Ok(())
    }
}

impl<T: Fn(BarEvent)> EventEmitter for T {
    fn record(&self, event: BarEvent) -> Result<(), EmissionError> {
        self(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{BarEvent, EventType};
    use crate::{
        context::{DeviceType, RequestContext},
        variant::Variant,
    };

    #[test]
    fn impression_payload_shape() {
        let ctx = RequestContext::new("https://shop.example/cart", DeviceType::Mobile)
            .session_id("visitor-1")
            .now(Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap());
        let event = BarEvent::impression(1, 11, Some(Variant::Test), &ctx);

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "bar_id": 1,
                "message_id": 11,
                "event_type": "impression",
                "variant": "test",
                "device_type": "mobile",
                "page_url": "https://shop.example/cart",
                "session_id": "visitor-1",
                "timestamp": "2025-01-07T12:00:00Z",
            })
        );
    }

    #[test]
    fn blank_session_is_omitted() {
        let ctx = RequestContext::new("", DeviceType::Desktop);
        let event = BarEvent::impression(1, 11, None, &ctx);
        assert_eq!(event.event_type, EventType::Impression);
        assert_eq!(event.session_id, None);
        assert_eq!(event.page_url, None);
    }
}
