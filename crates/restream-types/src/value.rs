//! Per-feed read results with a retrieval-failure sentinel.

use std::collections::HashMap;

use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::params::FeedTag;

/// Wire spelling of a value that could not be retrieved.
pub const UNAVAILABLE_SENTINEL: &str = "#";

/// One feed's slot in an aggregated read result.
///
/// A failed per-feed retrieval is data, not an error: it serializes as the
/// `"#"` sentinel and deserializing anything unparsable yields
/// [`FeedValue::Unavailable`] rather than failing the whole map.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedValue<T> {
    /// The value read from that feed's instance.
    Value(T),

    /// Retrieval failed for that feed only.
    Unavailable,
}

impl<T> FeedValue<T> {
    /// The contained value, if retrieval succeeded.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Unavailable => None,
        }
    }

    /// Whether this slot holds the failure sentinel.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl<T, E> From<Result<T, E>> for FeedValue<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(_) => Self::Unavailable,
        }
    }
}

impl<T: Serialize> Serialize for FeedValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE_SENTINEL),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FeedValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.as_str() == Some(UNAVAILABLE_SENTINEL) {
            return Ok(Self::Unavailable);
        }
        Ok(T::deserialize(raw).map_or(Self::Unavailable, Self::Value))
    }
}

/// Combined per-feed result of one read operation.
pub type AggregatedResult<T> = HashMap<FeedTag, FeedValue<T>>;
