//! Concurrent request fan-out over the registered instance services.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Client, Method};
use restream_types::{
    AggregatedResult, ExecutionStatus, FeedInit, FeedParams, FeedTag, FeedValue, MediaPlayParams,
    SidechainSettings, StreamSettings, TransitionSettings, API_CLEANUP_ROUTE, API_INIT_ROUTE,
    API_MEDIA_PLAY_ROUTE, API_SET_STREAM_SETTINGS_ROUTE, API_SIDECHAIN_ROUTE,
    API_SOURCE_VOLUME_ROUTE, API_STREAM_START_ROUTE, API_STREAM_STOP_ROUTE, API_TRANSITION_ROUTE,
    API_TS_OFFSET_ROUTE, API_TS_VOLUME_ROUTE, PARAM_MEDIA_PLAY, PARAM_OFFSET_SETTINGS,
    PARAM_SERVER_LANGS, PARAM_SIDECHAIN_SETTINGS, PARAM_STREAM_SETTINGS,
    PARAM_TRANSITION_SETTINGS, PARAM_VOLUME_SETTINGS,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::registry::InstanceRegistry;

/// Uniform timeout applied to every outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One outbound request of a fan-out round.
struct FeedRequest {
    feed: FeedTag,
    url: String,
    /// Query parameter carrying the feed's JSON slice, if the operation
    /// takes parameters.
    query: Option<(&'static str, String)>,
}

/// Per-feed delivery outcome: HTTP status and body, or a transport error.
type Delivery = Result<(u16, String), String>;

/// Mirrors the supervisor's operation surface across processes: every
/// operation becomes one HTTP request per targeted feed, carrying only that
/// feed's parameter slice, all issued concurrently. One feed's failure never
/// aborts the rest; delivery failures fold into the returned
/// [`ExecutionStatus`] or read sentinels.
pub struct BroadcastDispatcher {
    client: Client,
    registry: RwLock<Option<InstanceRegistry>>,
}

impl BroadcastDispatcher {
    /// Dispatcher with the default per-request timeout.
    pub fn new() -> DispatchResult<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Dispatcher with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> DispatchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            registry: RwLock::new(None),
        })
    }

    /// Whether a successful [`initialize`](Self::initialize) is in effect.
    pub fn is_initialized(&self) -> bool {
        self.registry.read().is_some()
    }

    /// Feeds of the current session, sorted.
    pub fn known_feeds(&self) -> Vec<FeedTag> {
        self.registry
            .read()
            .as_ref()
            .map(InstanceRegistry::feeds)
            .unwrap_or_default()
    }

    /// Validate init parameters, replace the registry wholesale and forward
    /// each feed its own slice.
    ///
    /// Validation is terminal: an invalid entry fails the call before any
    /// service is contacted. Each forwarded slice is rewritten with
    /// `obs_host = "localhost"`; the coordinator-facing `host_url` never
    /// reaches the instance side.
    #[instrument(name = "dispatch_initialize", skip(self, inits))]
    pub async fn initialize(&self, inits: &HashMap<FeedTag, FeedInit>) -> ExecutionStatus {
        let registry = match InstanceRegistry::from_init(inits) {
            Ok(registry) => registry,
            Err(e) => return ExecutionStatus::error(format!("init: {}", e)),
        };
        *self.registry.write() = Some(registry.clone());

        let mut status = ExecutionStatus::ok();
        let mut requests = Vec::new();
        for feed in registry.feeds() {
            let slice = HashMap::from([(feed.clone(), inits[&feed].to_instance_config())]);
            match encode_slice(&slice) {
                Ok(json) => {
                    // endpoint is present for every feed the registry lists
                    if let Some(endpoint) = registry.endpoint(&feed) {
                        requests.push(FeedRequest {
                            feed,
                            url: endpoint.route(API_INIT_ROUTE),
                            query: Some((PARAM_SERVER_LANGS, json)),
                        });
                    }
                }
                Err(e) => status.append_error(format!("init: {}: {}", feed, e)),
            }
        }

        for (feed, delivery) in self.send_all(Method::POST, requests).await {
            if let Err(message) = succeeded(delivery) {
                status.append_error(format!("init: {}: {}", feed, message));
            }
        }
        info!(feeds = self.known_feeds().len(), ok = status.is_ok(), "Session initialized");
        status
    }

    /// Broadcast cleanup and forget the session.
    #[instrument(name = "dispatch_cleanup", skip(self))]
    pub async fn cleanup(&self) -> ExecutionStatus {
        let status = self.post_all("cleanup", API_CLEANUP_ROUTE).await;
        *self.registry.write() = None;
        status
    }

    /// Trigger each feed's media insertion sequence.
    pub async fn play_media(&self, params: &FeedParams<MediaPlayParams>) -> ExecutionStatus {
        self.post_sliced("media_play", API_MEDIA_PLAY_ROUTE, PARAM_MEDIA_PLAY, params)
            .await
    }

    /// Set per-feed stream servers and keys.
    pub async fn set_stream_settings(&self, params: &FeedParams<StreamSettings>) -> ExecutionStatus {
        self.post_sliced(
            "set_stream_settings",
            API_SET_STREAM_SETTINGS_ROUTE,
            PARAM_STREAM_SETTINGS,
            params,
        )
        .await
    }

    /// Start streaming everywhere.
    pub async fn start_streaming(&self) -> ExecutionStatus {
        self.post_all("stream_start", API_STREAM_START_ROUTE).await
    }

    /// Stop streaming everywhere.
    pub async fn stop_streaming(&self) -> ExecutionStatus {
        self.post_all("stream_stop", API_STREAM_STOP_ROUTE).await
    }

    /// Set per-feed teamspeak audio sync offsets, milliseconds.
    pub async fn set_ts_sync_offset(&self, params: &FeedParams<i64>) -> ExecutionStatus {
        self.post_sliced("set_ts_offset", API_TS_OFFSET_ROUTE, PARAM_OFFSET_SETTINGS, params)
            .await
    }

    /// Read every feed's teamspeak audio sync offset.
    pub async fn get_ts_sync_offset(&self) -> DispatchResult<AggregatedResult<i64>> {
        self.broadcast_get(API_TS_OFFSET_ROUTE).await
    }

    /// Set per-feed teamspeak volumes, dB.
    pub async fn set_ts_volume_db(&self, params: &FeedParams<f64>) -> ExecutionStatus {
        self.post_sliced("set_ts_volume", API_TS_VOLUME_ROUTE, PARAM_VOLUME_SETTINGS, params)
            .await
    }

    /// Read every feed's teamspeak volume.
    pub async fn get_ts_volume_db(&self) -> DispatchResult<AggregatedResult<f64>> {
        self.broadcast_get(API_TS_VOLUME_ROUTE).await
    }

    /// Set per-feed live source volumes, dB.
    pub async fn set_source_volume_db(&self, params: &FeedParams<f64>) -> ExecutionStatus {
        self.post_sliced(
            "set_source_volume",
            API_SOURCE_VOLUME_ROUTE,
            PARAM_VOLUME_SETTINGS,
            params,
        )
        .await
    }

    /// Read every feed's live source volume.
    pub async fn get_source_volume_db(&self) -> DispatchResult<AggregatedResult<f64>> {
        self.broadcast_get(API_SOURCE_VOLUME_ROUTE).await
    }

    /// Attach or update the sidechain compressor per feed.
    pub async fn setup_sidechain(&self, params: &FeedParams<SidechainSettings>) -> ExecutionStatus {
        self.post_sliced("setup_sidechain", API_SIDECHAIN_ROUTE, PARAM_SIDECHAIN_SETTINGS, params)
            .await
    }

    /// Configure per-feed transitions.
    pub async fn setup_transition(
        &self,
        params: &FeedParams<TransitionSettings>,
    ) -> ExecutionStatus {
        self.post_sliced(
            "setup_transition",
            API_TRANSITION_ROUTE,
            PARAM_TRANSITION_SETTINGS,
            params,
        )
        .await
    }

    fn registry_snapshot(&self) -> DispatchResult<InstanceRegistry> {
        self.registry.read().clone().ok_or(DispatchError::NotInitialized)
    }

    /// POST a parameterless operation to every registered feed.
    async fn post_all(&self, op: &str, route: &str) -> ExecutionStatus {
        let registry = match self.registry_snapshot() {
            Ok(registry) => registry,
            Err(e) => return ExecutionStatus::error(format!("{}: {}", op, e)),
        };

        let requests = registry
            .feeds()
            .into_iter()
            .filter_map(|feed| {
                registry.endpoint(&feed).map(|endpoint| FeedRequest {
                    url: endpoint.route(route),
                    feed,
                    query: None,
                })
            })
            .collect();

        let mut status = ExecutionStatus::ok();
        for (feed, delivery) in self.send_all(Method::POST, requests).await {
            if let Err(message) = succeeded(delivery) {
                status.append_error(format!("{}: {}: {}", op, feed, message));
            }
        }
        status
    }

    /// POST a per-feed parameter slice to each targeted feed. Each request's
    /// query carries only that feed's slice, as a single-key JSON map.
    async fn post_sliced<T: Serialize>(
        &self,
        op: &str,
        route: &str,
        param_name: &'static str,
        params: &FeedParams<T>,
    ) -> ExecutionStatus {
        let registry = match self.registry_snapshot() {
            Ok(registry) => registry,
            Err(e) => return ExecutionStatus::error(format!("{}: {}", op, e)),
        };

        let mut status = ExecutionStatus::ok();
        let mut requests = Vec::new();
        for (feed, slice) in params.resolve(&registry.feeds()) {
            let Some(endpoint) = registry.endpoint(&feed) else {
                status.append_warning(format!("{}: unknown feed '{}'", op, feed));
                continue;
            };
            match encode_slice(&HashMap::from([(feed.clone(), slice)])) {
                Ok(json) => requests.push(FeedRequest {
                    url: endpoint.route(route),
                    feed,
                    query: Some((param_name, json)),
                }),
                Err(e) => status.append_error(format!("{}: {}: {}", op, feed, e)),
            }
        }

        for (feed, delivery) in self.send_all(Method::POST, requests).await {
            if let Err(message) = succeeded(delivery) {
                status.append_error(format!("{}: {}: {}", op, feed, message));
            }
        }
        status
    }

    /// GET one value from every feed and merge the per-feed response maps.
    /// A failed delivery or unparsable body becomes that feed's sentinel.
    async fn broadcast_get<T: DeserializeOwned>(
        &self,
        route: &str,
    ) -> DispatchResult<AggregatedResult<T>> {
        let registry = self.registry_snapshot()?;
        let requests = registry
            .feeds()
            .into_iter()
            .filter_map(|feed| {
                registry.endpoint(&feed).map(|endpoint| FeedRequest {
                    url: endpoint.route(route),
                    feed,
                    query: None,
                })
            })
            .collect();

        let mut merged = AggregatedResult::new();
        for (feed, delivery) in self.send_all(Method::GET, requests).await {
            match delivery {
                Ok((code, body)) if (200..300).contains(&code) => {
                    match serde_json::from_str::<AggregatedResult<T>>(&body) {
                        Ok(values) => merged.extend(values),
                        Err(e) => {
                            debug!(feed = %feed, "Unparsable read response: {}", e);
                            merged.insert(feed, FeedValue::Unavailable);
                        }
                    }
                }
                Ok((code, _)) => {
                    debug!(feed = %feed, code, "Read rejected");
                    merged.insert(feed, FeedValue::Unavailable);
                }
                Err(e) => {
                    warn!(feed = %feed, "Read delivery failed: {}", e);
                    merged.insert(feed, FeedValue::Unavailable);
                }
            }
        }
        Ok(merged)
    }

    /// Issue every request concurrently; results come back sorted by feed.
    async fn send_all(
        &self,
        method: Method,
        requests: Vec<FeedRequest>,
    ) -> Vec<(FeedTag, Delivery)> {
        let mut set = JoinSet::new();
        for request in requests {
            let client = self.client.clone();
            let method = method.clone();
            set.spawn(async move {
                let mut builder = client.request(method, &request.url);
                if let Some((name, json)) = &request.query {
                    builder = builder.query(&[(name, json.as_str())]);
                }
                let delivery = match builder.send().await {
                    Ok(response) => {
                        let code = response.status().as_u16();
                        let body = response.text().await.unwrap_or_default();
                        Ok((code, body))
                    }
                    Err(e) => Err(e.to_string()),
                };
                (request.feed, delivery)
            });
        }

        let mut results = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => warn!("Fan-out task failed to join: {}", e),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

/// Serialize one feed's slice for the query string.
fn encode_slice<T: Serialize>(slice: &T) -> Result<String, String> {
    serde_json::to_string(slice).map_err(|e| e.to_string())
}

/// Map a delivery to the message it contributes, if any.
fn succeeded(delivery: Delivery) -> Result<(), String> {
    match delivery {
        Ok((code, _)) if (200..300).contains(&code) => Ok(()),
        Ok((code, body)) => Err(format!("http {}: {}", code, body)),
        Err(message) => Err(message),
    }
}
