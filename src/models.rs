use serde::{Deserialize, Deserializer, Serialize};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque presentation fields (colors, fonts, padding, custom css, ...). The engine never
/// inspects them and passes them through to the widget verbatim.
pub type Presentation = serde_json::Map<String, serde_json::Value>;

/// Announcement bar configuration owned by one storefront account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarConfig {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rotation_enabled: bool,
    /// Seconds each message stays on screen when rotating. Valid range is 3..=60, see
    /// [`BarConfig::rotation_interval_secs`].
    #[serde(default, alias = "rotation_interval_seconds")]
    pub rotation_interval: Option<i64>,
    #[serde(default)]
    pub start_date: Option<Timestamp>,
    #[serde(default)]
    pub end_date: Option<Timestamp>,
    /// Messages are wrapped in `TryParse` so that a single malformed message does not take the
    /// whole bar down.
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<TryParse<Message>>,
    #[serde(flatten)]
    pub extra: Presentation,
}

impl BarConfig {
    /// Successfully parsed messages sorted by `display_order`, ties broken by `id`.
    pub fn ordered_messages(&self) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self
            .messages
            .iter()
            .filter_map(Option::<&Message>::from)
            .collect();
        messages.sort_by_key(|message| message.order_key());
        messages
    }

    /// Return `true` if `now` falls within the bar's own schedule window (bounds inclusive).
    pub fn is_within_schedule(&self, now: Timestamp) -> bool {
        is_within_window(self.start_date, self.end_date, now)
    }
}

/// One candidate piece of content a bar may display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub button_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub button_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_order: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub page_targeting_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_targeting_type: PageTargetingType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mobile_only: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub desktop_only: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub geo_targeting_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_countries: Vec<String>,

    #[serde(default)]
    pub start_date: Option<Timestamp>,
    #[serde(default)]
    pub end_date: Option<Timestamp>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub countdown_enabled: bool,
    #[serde(default)]
    pub countdown_date: Option<Timestamp>,
    #[serde(default)]
    pub countdown_text: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub ab_testing_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ab_variant_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ab_variant_button: String,
    /// `"control/test"` percentages, e.g. `"50/50"`.
    #[serde(default)]
    pub ab_traffic_split: Option<String>,

    #[serde(flatten)]
    pub presentation: Presentation,
}

impl Message {
    pub(crate) fn order_key(&self) -> (i64, i64) {
        (self.display_order, self.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTargetingType {
    #[default]
    All,
    Include,
    Exclude,
    /// Anything the store holds that we don't understand. Treated like `All`.
    #[serde(other)]
    Unknown,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

impl<T> From<T> for TryParse<T> {
    fn from(value: T) -> Self {
        TryParse::Parsed(value)
    }
}

/// Both bounds are optional and inclusive. An inverted window never contains anything.
pub(crate) fn is_within_window(
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    now: Timestamp,
) -> bool {
    let forbidden = matches!(start, Some(t) if now < t) || matches!(end, Some(t) if now > t);
    !forbidden
}

/// Relational rows carry explicit `null`s for unset columns.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
