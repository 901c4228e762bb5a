//! Per-feed parameter maps with wildcard expansion.

use std::collections::HashMap;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Opaque tag identifying one language/output feed.
pub type FeedTag = String;

/// Wildcard key meaning "apply to every currently-known feed".
pub const ALL_FEEDS: &str = "__all__";

/// Parameters for an operation spanning one or more feeds.
///
/// The JSON form is a plain map keyed by feed tag; a map containing the
/// single key `__all__` is the wildcard. Wildcard expansion against the
/// known-feed list happens at apply/dispatch time, not at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedParams<T> {
    /// One value applied to every known feed.
    All(T),

    /// Explicit per-feed values; feeds not listed are untouched.
    PerFeed(HashMap<FeedTag, T>),
}

impl<T> FeedParams<T> {
    /// The parameter slice for one feed, if this call targets it.
    pub fn get(&self, feed: &str) -> Option<&T> {
        match self {
            Self::All(value) => Some(value),
            Self::PerFeed(map) => map.get(feed),
        }
    }

    /// The feeds this call targets, expanding the wildcard against `known`.
    ///
    /// Explicit entries keep their own order of iteration; the result is
    /// sorted so aggregation output is deterministic.
    pub fn target_feeds(&self, known: &[FeedTag]) -> Vec<FeedTag> {
        let mut feeds: Vec<FeedTag> = match self {
            Self::All(_) => known.to_vec(),
            Self::PerFeed(map) => map.keys().cloned().collect(),
        };
        feeds.sort();
        feeds
    }

    /// Per-feed slices, wildcard-expanded, in deterministic feed order.
    pub fn resolve<'a>(&'a self, known: &[FeedTag]) -> Vec<(FeedTag, &'a T)> {
        self.target_feeds(known)
            .into_iter()
            .filter_map(|feed| self.get(&feed).map(|value| (feed.clone(), value)))
            .collect()
    }
}

impl<T: Serialize> Serialize for FeedParams<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All(value) => {
                serializer.collect_map(std::iter::once((ALL_FEEDS.to_string(), value)))
            }
            Self::PerFeed(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FeedParams<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = HashMap::<FeedTag, T>::deserialize(deserializer)?;
        if map.len() == 1 {
            if let Some(value) = map.remove(ALL_FEEDS) {
                return Ok(Self::All(value));
            }
        }
        Ok(Self::PerFeed(map))
    }
}
