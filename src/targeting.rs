//! Targeting evaluator: decides which messages are eligible for a request.
//!
//! Every rule is total. Contradictory configuration (both device flags, inverted dates) makes a
//! message permanently ineligible instead of failing the request.
//!
//! Page targeting uses exact path-prefix matching on segment boundaries: a target of
//! `/collections/sale` matches `/collections/sale` and `/collections/sale/shoes` but not
//! `/collections/sale-2024`. Query strings and fragments are ignored. When the target carries a
//! host, the page host must match it too (case-insensitively).
use url::Url;

use crate::{
    context::{DeviceType, RequestContext},
    models::{is_within_window, Message, PageTargetingType},
};

/// Return eligible messages in their original order.
pub fn filter<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
    ctx: &RequestContext,
) -> Vec<&'a Message> {
    messages
        .into_iter()
        .filter(|message| message.is_eligible(ctx))
        .collect()
}

impl Message {
    /// Return `true` if all targeting rules pass for `ctx`.
    pub fn is_eligible(&self, ctx: &RequestContext) -> bool {
        self.is_allowed_by_time(ctx)
            && self.is_allowed_by_device(ctx)
            && self.is_allowed_by_page(ctx)
            && self.is_allowed_by_geo(ctx)
    }

    fn is_allowed_by_time(&self, ctx: &RequestContext) -> bool {
        is_within_window(self.start_date, self.end_date, ctx.now)
    }

    fn is_allowed_by_device(&self, ctx: &RequestContext) -> bool {
        match (self.mobile_only, self.desktop_only) {
            (true, true) => false,
            (true, false) => ctx.device_type == DeviceType::Mobile,
            (false, true) => ctx.device_type == DeviceType::Desktop,
            (false, false) => true,
        }
    }

    fn is_allowed_by_page(&self, ctx: &RequestContext) -> bool {
        if !self.page_targeting_enabled {
            return true;
        }
        match self.page_targeting_type {
            PageTargetingType::Include => page_matches(&ctx.page_url, &self.target_url),
            PageTargetingType::Exclude => !page_matches(&ctx.page_url, &self.target_url),
            PageTargetingType::All | PageTargetingType::Unknown => true,
        }
    }

    /// Fails closed: an undetectable country never matches.
    fn is_allowed_by_geo(&self, ctx: &RequestContext) -> bool {
        if !self.geo_targeting_enabled {
            return true;
        }
        let Some(country) = &ctx.country_code else {
            return false;
        };
        self.target_countries
            .iter()
            .any(|target| target.trim().eq_ignore_ascii_case(country))
    }
}

#[derive(Debug, PartialEq)]
struct Location {
    host: Option<String>,
    path: String,
}

impl Location {
    fn parse(raw: &str) -> Location {
        match Url::parse(raw) {
            Ok(url) if url.has_host() => Location {
                host: url.host_str().map(str::to_ascii_lowercase),
                path: url.path().to_owned(),
            },
            _ => {
                // Relative reference, e.g. "/products/hat?variant=1".
                let path = raw.split(['?', '#']).next().unwrap_or_default();
                let path = if path.starts_with('/') {
                    path.to_owned()
                } else {
                    format!("/{path}")
                };
                Location { host: None, path }
            }
        }
    }
}

/// An empty target never matches.
fn page_matches(page_url: &str, target_url: &str) -> bool {
    let target_url = target_url.trim();
    if target_url.is_empty() {
        return false;
    }

    let page = Location::parse(page_url.trim());
    let target = Location::parse(target_url);

    if let Some(target_host) = &target.host {
        if page.host.as_ref() != Some(target_host) {
            return false;
        }
    }

    has_path_prefix(&page.path, &target.path)
}

fn has_path_prefix(path: &str, prefix: &str) -> bool {
    let path = path.trim_end_matches('/');
    let prefix = prefix.trim_end_matches('/');
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
