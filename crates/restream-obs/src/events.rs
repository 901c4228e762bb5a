//! Out-of-band events pushed by the remote production tool.

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Channel capacity for tool events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Asynchronous notifications delivered outside the request/response flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObsEvent {
    /// A named media source finished playing.
    MediaEnded {
        /// Source name as known to the tool.
        source: String,
    },

    /// The active scene changed.
    SceneSwitched {
        /// New active scene name.
        scene: String,
    },

    /// The RPC session dropped; no further events will arrive.
    Disconnected,
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<ObsEvent>, Receiver<ObsEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
