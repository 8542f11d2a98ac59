use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Desktop,
}

impl DeviceType {
    /// User-agent fragments that mark a handheld browser.
    const MOBILE_MARKERS: [&'static str; 5] = ["Mobi", "Android", "iPhone", "iPad", "iPod"];

    /// Best-effort classification used when the widget did not report a device. Anything we
    /// can't recognize as handheld counts as desktop.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if Self::MOBILE_MARKERS
            .iter()
            .any(|marker| user_agent.contains(marker))
        {
            DeviceType::Mobile
        } else {
            DeviceType::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device type {0:?}")]
pub struct ParseDeviceTypeError(String);

impl FromStr for DeviceType {
    type Err = ParseDeviceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(DeviceType::Mobile),
            "desktop" => Ok(DeviceType::Desktop),
            _ => Err(ParseDeviceTypeError(s.to_owned())),
        }
    }
}

/// Everything the engine knows about the visitor for a single request.
///
/// ```
/// # use announcement_bar::{DeviceType, RequestContext};
/// let ctx = RequestContext::new("https://shop.example/collections/sale", DeviceType::Mobile)
///     .country_code(Some("us"))
///     .session_id("visitor-1");
/// assert_eq!(ctx.country_code.as_deref(), Some("US"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub page_url: String,
    pub device_type: DeviceType,
    /// Upper-cased ISO country code, `None` when undetectable.
    pub country_code: Option<String>,
    /// Stable per visitor session. Used as the bucketing key for A/B variants.
    pub session_id: String,
    pub now: Timestamp,
}

impl RequestContext {
    pub fn new(page_url: impl Into<String>, device_type: DeviceType) -> Self {
        RequestContext {
            page_url: page_url.into(),
            device_type,
            country_code: None,
            session_id: String::new(),
            now: Utc::now(),
        }
    }

    /// Set the visitor's country. Blank codes are treated as undetectable.
    pub fn country_code(mut self, country_code: Option<&str>) -> Self {
        self.country_code = country_code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_ascii_uppercase);
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Override the evaluation clock.
    pub fn now(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceType, RequestContext};

    #[test]
    fn detects_mobile_user_agents() {
        assert_eq!(
            DeviceType::from_user_agent(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15"
            ),
            DeviceType::Mobile
        );
        assert_eq!(
            DeviceType::from_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile"),
            DeviceType::Mobile
        );
        assert_eq!(
            DeviceType::from_user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126.0"
            ),
            DeviceType::Desktop
        );
        assert_eq!(DeviceType::from_user_agent(""), DeviceType::Desktop);
    }

    #[test]
    fn parses_device_type() {
        assert_eq!("mobile".parse::<DeviceType>(), Ok(DeviceType::Mobile));
        assert_eq!(" Desktop ".parse::<DeviceType>(), Ok(DeviceType::Desktop));
        assert!("tablet".parse::<DeviceType>().is_err());
    }

    #[test]
    fn blank_country_is_undetectable() {
        let ctx = RequestContext::new("/", DeviceType::Desktop).country_code(Some("  "));
        assert_eq!(ctx.country_code, None);

        let ctx = RequestContext::new("/", DeviceType::Desktop).country_code(Some(" ca"));
        assert_eq!(ctx.country_code.as_deref(), Some("CA"));
    }
}
