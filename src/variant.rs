//! Variant selector: deterministic A/B bucketing of sessions.
//!
//! A session is bucketed by hashing `"{message_id}-{session_id}"` onto `0..100`. Buckets below
//! the control percentage see the base content, the rest see the test content. The same session
//! therefore always sees the same variant of a message for as long as the split is unchanged.
//!
//! A malformed split falls back to 50/50 rather than failing the request.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{context::RequestContext, models::Message, sharder::Sharder};

const TOTAL_BUCKETS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Control,
    Test,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Control => "control",
            Variant::Test => "test",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage of traffic assigned to control. The remainder goes to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficSplit {
    control: u8,
}

impl TrafficSplit {
    pub const EVEN: TrafficSplit = TrafficSplit { control: 50 };

    pub fn control_percent(&self) -> u8 {
        self.control
    }

    pub fn test_percent(&self) -> u8 {
        100 - self.control
    }

    /// Split configured on `message`, or [`TrafficSplit::EVEN`] when absent or malformed.
    pub fn for_message(message: &Message) -> TrafficSplit {
        let Some(raw) = message.ab_traffic_split.as_deref() else {
            return TrafficSplit::EVEN;
        };
        raw.parse().unwrap_or_else(|err| {
            log::debug!(target: "announcement_bar",
                        message_id = message.id;
                        "falling back to 50/50: {}", err);
            TrafficSplit::EVEN
        })
    }

    fn variant_for_bucket(&self, bucket: u64) -> Variant {
        if bucket < u64::from(self.control) {
            Variant::Control
        } else {
            Variant::Test
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed traffic split {0:?}, expected \"control/test\" percentages summing to 100")]
pub struct ParseTrafficSplitError(String);

impl FromStr for TrafficSplit {
    type Err = ParseTrafficSplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTrafficSplitError(s.to_owned());

        let (control, test) = s.split_once('/').ok_or_else(err)?;
        let control: u8 = control.trim().parse().map_err(|_| err())?;
        let test: u8 = test.trim().parse().map_err(|_| err())?;

        if u16::from(control) + u16::from(test) != 100 {
            return Err(err());
        }
        Ok(TrafficSplit { control })
    }
}

/// Content to render for a message after the variant override is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    /// `None` when the message is not A/B tested.
    pub variant: Option<Variant>,
    pub text: String,
    pub button_text: String,
}

/// Pick the variant of `message` for the visitor and resolve the fields to render.
pub fn resolve(message: &Message, ctx: &RequestContext, sharder: &impl Sharder) -> RenderedContent {
    if !message.ab_testing_enabled {
        return RenderedContent {
            variant: None,
            text: message.text.clone(),
            button_text: message.button_text.clone(),
        };
    }

    let bucket = sharder.get_shard(
        format!("{}-{}", message.id, ctx.session_id),
        TOTAL_BUCKETS,
    );
    let variant = TrafficSplit::for_message(message).variant_for_bucket(bucket);

    match variant {
        Variant::Control => RenderedContent {
            variant: Some(variant),
            text: message.text.clone(),
            button_text: message.button_text.clone(),
        },
        Variant::Test => RenderedContent {
            variant: Some(variant),
            text: non_empty_or(&message.ab_variant_text, &message.text),
            button_text: non_empty_or(&message.ab_variant_button, &message.button_text),
        },
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_owned()
    } else {
        value.to_owned()
    }
}
