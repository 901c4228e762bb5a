//! Cross-process fan-out over the per-feed instance services.
//!
//! [`BroadcastDispatcher`] mirrors the supervisor's operation surface, but
//! each operation becomes one HTTP request per targeted feed against the
//! services held in the [`InstanceRegistry`], issued concurrently and folded
//! into the same [`ExecutionStatus`](restream_types::ExecutionStatus) and
//! aggregated-read shapes the in-process layer produces.

mod dispatcher;
mod error;
mod registry;

pub use dispatcher::{BroadcastDispatcher, REQUEST_TIMEOUT};
pub use error::{DispatchError, DispatchResult};
pub use registry::{InstanceEndpoint, InstanceRegistry};
