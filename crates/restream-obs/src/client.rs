//! The typed RPC surface consumed by the controller.

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcResult;
use crate::events::ObsEvent;

/// Request to create a named source inside a scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSource {
    /// Source name; identity within the tool's scene graph.
    pub name: String,

    /// Source kind as understood by the tool, e.g. `"ffmpeg_source"`.
    pub kind: String,

    /// Scene the source is placed into.
    pub scene: String,

    /// Kind-specific settings payload.
    pub settings: Value,
}

/// One item inside a scene, as reported by the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneItem {
    /// Item id within the scene.
    pub id: i64,

    /// Name of the source the item references.
    pub source_name: String,
}

/// Audio monitoring mode of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringMode {
    /// Neither monitored nor sent to the output mix.
    None,

    /// Audible on the operator's speakers only, excluded from the mix.
    MonitorOnly,

    /// Monitored and included in the output mix.
    MonitorAndOutput,
}

/// Blocking request/response session with one remote production tool.
///
/// Every call returns `Err(RpcError::Rejected { .. })` when the tool answers
/// with a false success flag. Implementations must be safe to call from both
/// the request-handling thread and the controller's scheduler thread.
pub trait ObsRpc: Send + Sync {
    // -- scene ops --

    /// Names of every scene known to the tool.
    fn list_scenes(&self) -> RpcResult<Vec<String>>;

    /// Create an empty scene.
    fn create_scene(&self, name: &str) -> RpcResult<()>;

    /// Switch the active scene.
    fn set_current_scene(&self, name: &str) -> RpcResult<()>;

    /// Name of the currently active scene.
    fn current_scene(&self) -> RpcResult<String>;

    /// Items currently placed inside a scene.
    fn list_scene_items(&self, scene: &str) -> RpcResult<Vec<SceneItem>>;

    /// Remove one item from a scene.
    fn remove_scene_item(&self, scene: &str, item: &SceneItem) -> RpcResult<()>;

    // -- source ops --

    /// Create a named source. Fails if the name is already taken.
    fn create_source(&self, request: &CreateSource) -> RpcResult<()>;

    /// Delete a named source wherever it appears.
    fn delete_source(&self, name: &str) -> RpcResult<()>;

    // -- audio ops --

    /// Mute or unmute a source.
    fn set_mute(&self, source: &str, mute: bool) -> RpcResult<()>;

    /// Set a source's volume in dB.
    fn set_volume_db(&self, source: &str, db: f64) -> RpcResult<()>;

    /// Read a source's volume in dB.
    fn volume_db(&self, source: &str) -> RpcResult<f64>;

    /// Set a source's audio sync offset in milliseconds.
    fn set_sync_offset_ms(&self, source: &str, offset_ms: i64) -> RpcResult<()>;

    /// Read a source's audio sync offset in milliseconds.
    fn sync_offset_ms(&self, source: &str) -> RpcResult<i64>;

    /// Set a source's audio monitoring mode.
    fn set_audio_monitoring(&self, source: &str, mode: MonitoringMode) -> RpcResult<()>;

    // -- media ops --

    /// Duration of a media source's file in milliseconds.
    fn media_duration_ms(&self, source: &str) -> RpcResult<u64>;

    /// Seek a media source back to time zero and play it.
    fn restart_media(&self, source: &str) -> RpcResult<()>;

    // -- filter ops --

    /// Names of the filters attached to a source.
    fn list_filters(&self, source: &str) -> RpcResult<Vec<String>>;

    /// Attach a new filter to a source.
    fn add_filter(&self, source: &str, filter: &str, kind: &str, settings: Value)
        -> RpcResult<()>;

    /// Update an existing filter's settings.
    fn set_filter_settings(&self, source: &str, filter: &str, settings: Value) -> RpcResult<()>;

    // -- streaming ops --

    /// Set the stream server and key.
    fn set_stream_settings(&self, server: &str, key: &str) -> RpcResult<()>;

    /// Start streaming.
    fn start_streaming(&self) -> RpcResult<()>;

    /// Stop streaming.
    fn stop_streaming(&self) -> RpcResult<()>;

    // -- events --

    /// A receiver of out-of-band tool events. Each call returns a clone of
    /// the same underlying channel.
    fn events(&self) -> Receiver<ObsEvent>;
}

/// Factory opening RPC sessions; injected into the supervisor so tests and
/// embedders choose the concrete transport.
pub trait ObsConnect: Send + Sync {
    /// Open a session to the tool at `host:port`.
    fn connect(&self, host: &str, port: u16, password: Option<&str>)
        -> RpcResult<Box<dyn ObsRpc>>;
}
