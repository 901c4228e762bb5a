//! Per-instance playback sequencing and supervision.
//!
//! This crate drives the remote production tools: [`InstanceController`]
//! owns one RPC session and its media insertion [`sequencer`],
//! [`InstanceSupervisor`] fans every operation out across the controllers of
//! one process and folds per-feed failures into one
//! [`ExecutionStatus`](restream_types::ExecutionStatus).

mod controller;
mod error;
mod media;
mod scheduler;
mod sequencer;
mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::InstanceController;
pub use error::{ControlError, ControlResult};
pub use media::resolve_media;
pub use scheduler::{Action, Scheduler, POLL_INTERVAL};
pub use sequencer::{Phase, TransitionConfig, DEFAULT_TRANSITION_POINT_MS};
pub use supervisor::InstanceSupervisor;

/// Reserved names inside each instance's scene graph. At most one source per
/// name exists at any time; recreating one deletes the stale holder first.
pub mod names {
    /// The always-on live source.
    pub const ORIGINAL: &str = "original";

    /// The inserted media clip.
    pub const MEDIA: &str = "media";

    /// The stinger transition clip.
    pub const TRANSITION: &str = "transition";

    /// The teamspeak audio capture input.
    pub const TEAMSPEAK: &str = "audio-sidecar";

    /// The scene every instance is provisioned with.
    pub const MAIN_SCENE: &str = "main";

    /// The sidechain compressor filter on the live source.
    pub const SIDECHAIN_FILTER: &str = "sidechain";
}
