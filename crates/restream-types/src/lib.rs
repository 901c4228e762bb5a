//! Shared data model for the restream coordinator.
//!
//! This crate defines the types every other layer agrees on: the aggregable
//! [`ExecutionStatus`], per-feed parameter maps, read-result sentinels, the
//! wire-facing parameter structs and the API route constants.

mod params;
mod routes;
mod status;
mod value;
mod wire;

pub use params::{FeedParams, FeedTag, ALL_FEEDS};
pub use routes::*;
pub use status::ExecutionStatus;
pub use value::{AggregatedResult, FeedValue, UNAVAILABLE_SENTINEL};
pub use wire::{
    FeedInit, InstanceConfig, MediaPlayParams, SidechainSettings, StreamSettings,
    TransitionSettings,
};
