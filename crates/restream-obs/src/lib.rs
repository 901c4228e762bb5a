//! RPC capability boundary to the remote production tool.
//!
//! The coordinator only ever talks to the production tool through the
//! [`ObsRpc`] trait: typed request/response calls keyed by scene and source
//! name, plus an out-of-band event channel. The concrete wire protocol lives
//! behind an [`ObsConnect`] implementation supplied by the embedding process.

mod client;
mod error;
mod events;

pub use client::{CreateSource, MonitoringMode, ObsConnect, ObsRpc, SceneItem};
pub use error::{RpcError, RpcResult};
pub use events::{event_channel, ObsEvent, EVENT_CHANNEL_CAPACITY};
