//! Wire-facing parameter structs.

use serde::{Deserialize, Serialize};

/// Per-feed initialization parameters as submitted to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedInit {
    /// Base address of the feed's instance-service process.
    pub host_url: String,

    /// Websocket port of the remote production tool.
    pub websocket_port: u16,

    /// Websocket password, if the tool requires one.
    #[serde(default)]
    pub password: Option<String>,

    /// Always-on live media URL (rtmp/srt) for the `original` source.
    pub original_media_url: String,
}

/// Per-feed initialization parameters as forwarded to one instance service.
///
/// The coordinator strips `host_url` and pins `obs_host` to the instance
/// service's own machine before forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Host the production tool listens on, relative to the instance service.
    pub obs_host: String,

    /// Websocket port of the remote production tool.
    pub websocket_port: u16,

    /// Websocket password, if the tool requires one.
    #[serde(default)]
    pub password: Option<String>,

    /// Always-on live media URL for the `original` source.
    pub original_media_url: String,
}

impl FeedInit {
    /// The slice forwarded to the feed's instance service.
    pub fn to_instance_config(&self) -> InstanceConfig {
        InstanceConfig {
            obs_host: "localhost".to_string(),
            websocket_port: self.websocket_port,
            password: self.password.clone(),
            original_media_url: self.original_media_url.clone(),
        }
    }
}

/// Media insertion request for one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPlayParams {
    /// Requested file name, e.g. `"003_intro.mp4"`.
    pub name: String,

    /// Match any file sharing the request's leading digits instead of
    /// requiring an exact name.
    #[serde(default)]
    pub search_by_num: bool,
}

/// Stream target for one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Ingest server URL, e.g. `"rtmp://live.example.com/app"`.
    pub server: String,

    /// Stream key.
    pub key: String,
}

/// Sidechain compressor settings for one feed. Unset fields keep the
/// filter's current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidechainSettings {
    /// Compression ratio.
    #[serde(default)]
    pub ratio: Option<f64>,

    /// Release time in milliseconds.
    #[serde(default)]
    pub release_time: Option<f64>,

    /// Threshold in dB.
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Transition configuration for one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSettings {
    /// Transition style name: `"cut"` or `"stinger"`.
    pub transition_name: String,

    /// Stinger clip path. Required for `"stinger"`, ignored for `"cut"`.
    #[serde(default)]
    pub path: Option<String>,

    /// Milliseconds into the stinger clip at which the content swap fires.
    #[serde(default)]
    pub transition_point: Option<u64>,
}
