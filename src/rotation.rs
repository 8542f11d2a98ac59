//! Rotation scheduler.
//!
//! Rotation is a pure function of wall-clock time: the active message index is
//! `floor(now_seconds / interval) mod eligible.len()`. Every visitor of a bar sees the same
//! message during an interval, and no per-bar state has to be remembered between requests.
use crate::{
    context::RequestContext,
    models::{BarConfig, Message, Timestamp},
};

pub const MIN_ROTATION_INTERVAL_SECS: i64 = 3;
pub const MAX_ROTATION_INTERVAL_SECS: i64 = 60;
pub const DEFAULT_ROTATION_INTERVAL_SECS: i64 = 5;

impl BarConfig {
    /// Rotation interval in seconds, clamped to the supported range.
    pub fn rotation_interval_secs(&self) -> i64 {
        self.rotation_interval
            .unwrap_or(DEFAULT_ROTATION_INTERVAL_SECS)
            .clamp(MIN_ROTATION_INTERVAL_SECS, MAX_ROTATION_INTERVAL_SECS)
    }
}

/// Pick the message to show for this load out of the eligible ones.
pub fn select<'a>(
    eligible: &[&'a Message],
    bar: &BarConfig,
    ctx: &RequestContext,
) -> Option<&'a Message> {
    match eligible {
        [] => None,
        [only] => Some(*only),
        _ if !bar.rotation_enabled => eligible.iter().copied().min_by_key(|m| m.order_key()),
        _ => {
            let mut ordered = eligible.to_vec();
            ordered.sort_by_key(|m| m.order_key());
            let index = rotation_index(ctx.now, bar.rotation_interval_secs(), ordered.len());
            ordered.get(index).copied()
        }
    }
}

/// `interval_secs` must be positive and `len` non-zero.
pub fn rotation_index(now: Timestamp, interval_secs: i64, len: usize) -> usize {
    let window = now.timestamp().div_euclid(interval_secs);
    // `len` is a handful of operator-authored messages, it always fits in i64.
    window.rem_euclid(len as i64) as usize
}
