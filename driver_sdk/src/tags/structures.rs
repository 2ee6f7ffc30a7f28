use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::{SystemTime, UNIX_EPOCH};

/// Represents the quality of a tag's value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Quality {
    Good,
    Bad,
    Initializing,
    CommFailure, // Specific bad quality
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Initializing
    }
}

/// Represents the last emitted value, quality, and timestamp of a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagValue {
    pub value: Option<Decimal>,
    pub quality: Quality,
    pub timestamp: u64, // Unix timestamp milliseconds
}

impl TagValue {
    // Helper to create a new TagValue with current time
    pub fn new(value: Option<Decimal>, quality: Quality) -> Self {
        TagValue {
            value,
            quality,
            timestamp: now_millis(),
        }
    }

    pub fn good(value: Decimal) -> Self {
        Self::new(Some(value), Quality::Good)
    }

    // Helper for bad quality
    pub fn bad(reason: Quality) -> Self {
        Self::new(None, reason)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Identifies a tag on a specific device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
    pub device_id: String,
    pub tag_id: String,
}

impl TagKey {
    pub fn new(device_id: impl Into<String>, tag_id: impl Into<String>) -> Self {
        TagKey {
            device_id: device_id.into(),
            tag_id: tag_id.into(),
        }
    }
}

impl std::fmt::Display for TagKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.tag_id)
    }
}

/// Configuration for one measurable quantity of a device.
///
/// Field names are snake_case in local TOML files; the camelCase names used
/// by the platform's JSON payloads are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Tag {
    #[serde(alias = "deviceId")]
    pub device_id: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Protocol-specific address on the device; defaults to the tag id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    /// Decimal places to round the scaled value to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<u32>,
    /// Multiplier applied after scaling and rounding.
    #[serde(default, rename = "mod", skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    /// Raw sample sequence replayed by the replay driver.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_samples"
    )]
    pub samples: Vec<serde_json::Value>,
}

impl Tag {
    pub fn key(&self) -> TagKey {
        TagKey::new(self.device_id.clone(), self.id.clone())
    }

    pub fn driver_address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.id)
    }
}

/// `null` samples carry no reading and TOML has no way to write them, so
/// they are left out.
fn serialize_samples<S>(samples: &[serde_json::Value], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(samples.iter().filter(|sample| !sample.is_null()))
}

/// Linear raw-to-engineering mapping. Each bound is optional on its own.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Scaling {
    #[serde(default, alias = "minRaw")]
    pub min_raw: Option<Decimal>,
    #[serde(default, alias = "maxRaw")]
    pub max_raw: Option<Decimal>,
    #[serde(default, alias = "minValue")]
    pub min_value: Option<Decimal>,
    #[serde(default, alias = "maxValue")]
    pub max_value: Option<Decimal>,
}

/// Fallback strategy applied when a reading fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Active {
    /// Substitute the given value; without one the raw reading passes through.
    Fixed(Option<Decimal>),
    /// Clamp to the nearest violated bound.
    Boundary,
    /// Drop the reading.
    Discard,
    /// Repeat the previous accepted value.
    Latest,
}

impl Default for Active {
    fn default() -> Self {
        Active::Discard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveKind {
    Fixed,
    Boundary,
    Discard,
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidAction {
    Save,
}

/// Validation policy for one tag.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(from = "RangeConfig", into = "RangeConfig")]
pub struct Range {
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
    pub conditions: Vec<RangeCondition>,
    pub active: Active,
    pub invalid_action: Option<InvalidAction>,
}

impl Range {
    /// Both simple bounds, when the policy is in simple-bounds mode.
    pub fn bounds(&self) -> Option<(Decimal, Decimal)> {
        self.min_value.zip(self.max_value)
    }

    pub fn saves_invalid(&self) -> bool {
        self.invalid_action == Some(InvalidAction::Save)
    }

    /// The condition seeding boundary substitutes. The first flagged entry wins.
    pub fn default_condition(&self) -> Option<&RangeCondition> {
        self.conditions.iter().find(|c| c.default_condition)
    }
}

/// Wire shape of [`Range`]: `active` and `fixedValue` are separate fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RangeConfig {
    #[serde(default, alias = "minValue", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Decimal>,
    #[serde(default, alias = "maxValue", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RangeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveKind>,
    #[serde(default, alias = "fixedValue", skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<Decimal>,
    #[serde(
        default,
        alias = "invalidAction",
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub invalid_action: Option<InvalidAction>,
}

impl From<RangeConfig> for Range {
    fn from(cfg: RangeConfig) -> Self {
        let active = match cfg.active {
            Some(ActiveKind::Fixed) => Active::Fixed(cfg.fixed_value),
            Some(ActiveKind::Boundary) => Active::Boundary,
            Some(ActiveKind::Latest) => Active::Latest,
            Some(ActiveKind::Discard) | None => Active::Discard,
        };
        Range {
            min_value: cfg.min_value,
            max_value: cfg.max_value,
            conditions: cfg.conditions,
            active,
            invalid_action: cfg.invalid_action,
        }
    }
}

impl From<Range> for RangeConfig {
    fn from(range: Range) -> Self {
        let (active, fixed_value) = match range.active {
            Active::Fixed(value) => (ActiveKind::Fixed, value),
            Active::Boundary => (ActiveKind::Boundary, None),
            Active::Discard => (ActiveKind::Discard, None),
            Active::Latest => (ActiveKind::Latest, None),
        };
        RangeConfig {
            min_value: range.min_value,
            max_value: range.max_value,
            conditions: range.conditions,
            active: Some(active),
            fixed_value,
            invalid_action: range.invalid_action,
        }
    }
}

/// Accepts `""` (the platform's "no action") as `None`.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<InvalidAction>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("save") => Ok(Some(InvalidAction::Save)),
        Some(other) => Err(serde::de::Error::unknown_variant(other, &["save", ""])),
    }
}

/// What quantity a condition compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionMode {
    /// The raw reading itself.
    #[default]
    Number,
    /// Percentage change versus the previous accepted value.
    Rate,
    /// Difference from the previous accepted value.
    Delta,
}

/// Comparator shape of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    #[default]
    Range,
    Greater,
    Less,
}

/// One test in a range policy's ordered condition list.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RangeCondition {
    #[serde(default)]
    pub mode: ConditionMode,
    #[serde(default)]
    pub condition: Comparator,
    #[serde(default, alias = "minValue", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Decimal>,
    #[serde(default, alias = "maxValue", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(default, alias = "defaultCondition")]
    pub default_condition: bool,
}

/// Result of processing one raw sample for one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagUpdate {
    pub device_id: String,
    pub tag_id: String,
    /// Value to publish, in engineering units. `None` keeps the last one.
    pub value: Option<Decimal>,
    /// Rejected raw reading to archive alongside.
    pub side_value: Option<Decimal>,
    pub persist: bool,
    pub timestamp: u64,
}
