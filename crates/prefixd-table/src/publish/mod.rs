//! Publication engine state: throttle timing and per-key version tracking.

pub mod constants;
pub mod throttle;
pub mod tracker;

pub use constants::*;
pub use throttle::Throttle;
pub use tracker::{ExternalUpdate, KeyState, Observed, Publication, PublishedKeys};
