//! Configuration diagnostics.
//!
//! Evaluation never rejects configuration: every problem reported here has a defined fallback at
//! request time (usually "never eligible"). These checks belong where bars are written, and are
//! also run whenever a configuration snapshot is loaded so operators see them in the logs.
use std::collections::HashMap;

use crate::{
    models::{BarConfig, Message, PageTargetingType, TryParse},
    rotation::{MAX_ROTATION_INTERVAL_SECS, MIN_ROTATION_INTERVAL_SECS},
    variant::{ParseTrafficSplitError, TrafficSplit},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bar {bar_id}: start_date is after end_date, bar is never served")]
    InvertedBarSchedule { bar_id: i64 },
    #[error("bar {bar_id}: rotation interval {interval}s is outside 3..=60, clamping")]
    RotationIntervalOutOfRange { bar_id: i64, interval: i64 },
    #[error("bar {bar_id}: display_order {display_order} is shared by several messages")]
    DuplicateDisplayOrder { bar_id: i64, display_order: i64 },
    #[error("bar {bar_id}: a message failed to parse and is skipped")]
    UnparseableMessage { bar_id: i64 },
    #[error("message {message_id}: both mobile_only and desktop_only are set, message is never eligible")]
    ConflictingDeviceTargeting { message_id: i64 },
    #[error("message {message_id}: start_date is after end_date, message is never eligible")]
    InvertedMessageSchedule { message_id: i64 },
    #[error("message {message_id}: unknown page targeting type, treating as \"all\"")]
    UnknownPageTargetingType { message_id: i64 },
    #[error("message {message_id}: page targeting is enabled without a target url")]
    MissingTargetUrl { message_id: i64 },
    #[error("message {message_id}: geo targeting is enabled without target countries, message is never eligible")]
    EmptyTargetCountries { message_id: i64 },
    #[error("message {message_id}: using 50/50 split")]
    MalformedTrafficSplit {
        message_id: i64,
        #[source]
        source: ParseTrafficSplitError,
    },
}

/// Check a bar and all of its messages.
pub fn validate_bar(bar: &BarConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if matches!((bar.start_date, bar.end_date), (Some(start), Some(end)) if start > end) {
        errors.push(ConfigError::InvertedBarSchedule { bar_id: bar.id });
    }

    if let Some(interval) = bar.rotation_interval {
        if !(MIN_ROTATION_INTERVAL_SECS..=MAX_ROTATION_INTERVAL_SECS).contains(&interval) {
            errors.push(ConfigError::RotationIntervalOutOfRange {
                bar_id: bar.id,
                interval,
            });
        }
    }

    let mut display_orders: HashMap<i64, usize> = HashMap::new();
    for message in &bar.messages {
        match message {
            TryParse::Parsed(message) => {
                *display_orders.entry(message.display_order).or_default() += 1;
                errors.extend(validate_message(message));
            }
            TryParse::ParseFailed(_) => {
                errors.push(ConfigError::UnparseableMessage { bar_id: bar.id });
            }
        }
    }

    let mut duplicated: Vec<i64> = display_orders
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(display_order, _)| display_order)
        .collect();
    duplicated.sort_unstable();
    errors.extend(
        duplicated
            .into_iter()
            .map(|display_order| ConfigError::DuplicateDisplayOrder {
                bar_id: bar.id,
                display_order,
            }),
    );

    errors
}

pub fn validate_message(message: &Message) -> Vec<ConfigError> {
    let message_id = message.id;
    let mut errors = Vec::new();

    if message.mobile_only && message.desktop_only {
        errors.push(ConfigError::ConflictingDeviceTargeting { message_id });
    }

    if matches!((message.start_date, message.end_date), (Some(start), Some(end)) if start > end)
    {
        errors.push(ConfigError::InvertedMessageSchedule { message_id });
    }

    if message.page_targeting_enabled {
        match message.page_targeting_type {
            PageTargetingType::Unknown => {
                errors.push(ConfigError::UnknownPageTargetingType { message_id });
            }
            PageTargetingType::Include | PageTargetingType::Exclude
                if message.target_url.trim().is_empty() =>
            {
                errors.push(ConfigError::MissingTargetUrl { message_id });
            }
            _ => {}
        }
    }

    if message.geo_targeting_enabled
        && message
            .target_countries
            .iter()
            .all(|country| country.trim().is_empty())
    {
        errors.push(ConfigError::EmptyTargetCountries { message_id });
    }

    if message.ab_testing_enabled {
        if let Some(Err(source)) = message
            .ab_traffic_split
            .as_deref()
            .map(str::parse::<TrafficSplit>)
        {
            errors.push(ConfigError::MalformedTrafficSplit { message_id, source });
        }
    }

    errors
}
