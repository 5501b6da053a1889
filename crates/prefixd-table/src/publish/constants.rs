//! Publication timing defaults.

use std::time::Duration;

/// Quiescence window after the last dirty mutation before a flush.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(250);

/// Upper bound on how long a steady trickle of mutations can defer a flush.
pub const DEFAULT_MAX_THROTTLE: Duration = Duration::from_secs(2);

/// TTL attached to every published key.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(300);

/// Advertised keys are refreshed this many times per TTL.
pub const TTL_REFRESH_DIVISOR: u32 = 4;

/// Smallest usable key TTL. Anything shorter leaves no refresh interval.
pub const MIN_KEY_TTL: Duration = Duration::from_millis(1);
