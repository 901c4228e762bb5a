//! Feed-to-endpoint registry.

use std::collections::HashMap;

use restream_types::{FeedInit, FeedTag};
use url::Url;

use crate::error::{DispatchError, DispatchResult};

/// Base address of one feed's instance service.
#[derive(Debug, Clone)]
pub struct InstanceEndpoint {
    address: Url,
}

impl InstanceEndpoint {
    /// The service's base address.
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Absolute URL of one API route on this endpoint.
    pub fn route(&self, route: &str) -> String {
        format!("{}{}", self.address.as_str().trim_end_matches('/'), route)
    }
}

/// The feeds of one coordination session and where their instance services
/// live. Built once per `initialize` and replaced wholesale; entries are
/// never patched individually.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    endpoints: HashMap<FeedTag, InstanceEndpoint>,
}

impl InstanceRegistry {
    /// Validate init parameters and build the registry. Any invalid entry
    /// fails the whole build; no partial registry is ever produced.
    pub fn from_init(inits: &HashMap<FeedTag, FeedInit>) -> DispatchResult<Self> {
        if inits.is_empty() {
            return Err(DispatchError::Validation(
                "at least one feed must be configured".to_string(),
            ));
        }

        let mut endpoints = HashMap::new();
        for (feed, init) in inits {
            let address = Url::parse(&init.host_url).map_err(|e| {
                DispatchError::Validation(format!(
                    "{}: invalid host_url '{}': {}",
                    feed, init.host_url, e
                ))
            })?;
            if !matches!(address.scheme(), "http" | "https") {
                return Err(DispatchError::Validation(format!(
                    "{}: host_url '{}' must be http(s)",
                    feed, init.host_url
                )));
            }
            if init.original_media_url.is_empty() {
                return Err(DispatchError::Validation(format!(
                    "{}: original_media_url must not be empty",
                    feed
                )));
            }
            endpoints.insert(feed.clone(), InstanceEndpoint { address });
        }
        Ok(Self { endpoints })
    }

    /// Registered feeds, sorted.
    pub fn feeds(&self) -> Vec<FeedTag> {
        let mut feeds: Vec<FeedTag> = self.endpoints.keys().cloned().collect();
        feeds.sort();
        feeds
    }

    /// The endpoint serving one feed, if it is registered.
    pub fn endpoint(&self, feed: &str) -> Option<&InstanceEndpoint> {
        self.endpoints.get(feed)
    }
}
