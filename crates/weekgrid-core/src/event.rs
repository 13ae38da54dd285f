use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Opaque event identifier. Snapshots may carry either strings or numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for EventId {
    fn from(raw: u64) -> Self {
        Self(raw.to_string())
    }
}

impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        scalar_to_string(&value)
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom("event id must be a string or a number"))
    }
}

/// Identifier of a resource (a room, a person, a machine...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        scalar_to_string(value).map(Self)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("resource key must be a scalar"))
    }
}

/// The resources an event belongs to: nothing, a single scalar, or a set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceKeys {
    #[default]
    None,
    One(ResourceKey),
    Many(Vec<ResourceKey>),
}

impl ResourceKeys {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Array(items) => {
                Self::Many(items.iter().filter_map(ResourceKey::from_value).collect())
            }
            other => ResourceKey::from_value(other)
                .map(Self::One)
                .unwrap_or(Self::None),
        }
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        match self {
            Self::None => false,
            Self::One(own) => own == key,
            Self::Many(keys) => keys.contains(key),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::One(_) => false,
            Self::Many(keys) => keys.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    pub start: DateTime<Utc>,

    pub end: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "ResourceKeys::is_empty")]
    pub resource_keys: ResourceKeys,

    #[serde(default)]
    pub disabled: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Event {
    pub fn new(id: impl Into<EventId>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            resource_keys: ResourceKeys::None,
            disabled: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_resources(mut self, keys: ResourceKeys) -> Self {
        self.resource_keys = keys;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.extra
            .insert("title".to_string(), Value::String(title.to_string()));
        self
    }

    /// Display title for text output; falls back to the id.
    pub fn title(&self) -> String {
        self.extra
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("event {}", self.id))
    }

    pub fn is_malformed(&self) -> bool {
        self.end <= self.start
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
