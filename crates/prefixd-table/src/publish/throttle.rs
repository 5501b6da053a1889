//! Flush timing: quiescence window, cap, and one-time startup hold.

use std::time::{Duration, Instant};

/// Decides when dirty prefixes are flushed.
///
/// Each dirty mutation re-arms the deadline to `now + window`, but never past
/// `first_pending + max_wait`, so a continuous trickle still flushes. Until
/// the first flush fires, the deadline is also held back to `hold_until`.
#[derive(Debug, Clone)]
pub struct Throttle {
    window: Duration,
    max_wait: Duration,
    hold_until: Option<Instant>,
    deadline: Option<Instant>,
    first_pending: Option<Instant>,
}

impl Throttle {
    pub fn new(window: Duration, max_wait: Duration) -> Self {
        Self {
            window,
            max_wait: max_wait.max(window),
            hold_until: None,
            deadline: None,
            first_pending: None,
        }
    }

    /// Delay the first flush until `start + hold`.
    #[must_use]
    pub fn with_hold(mut self, start: Instant, hold: Duration) -> Self {
        if !hold.is_zero() {
            self.hold_until = Some(start + hold);
        }
        self
    }

    /// Record a dirty mutation at `now` and re-arm the deadline.
    pub fn mark_dirty(&mut self, now: Instant) {
        let first = *self.first_pending.get_or_insert(now);
        let cap = first + self.max_wait;
        self.deadline = Some((now + self.window).min(cap));
    }

    /// Re-arm after a failed publication, starting a fresh cap window.
    pub fn retry(&mut self, now: Instant) {
        self.first_pending = None;
        self.mark_dirty(now);
    }

    /// When the next flush is due, if anything is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let deadline = self.deadline?;
        Some(match self.hold_until {
            Some(hold) => deadline.max(hold),
            None => deadline,
        })
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|d| d <= now)
    }

    /// Whether the startup hold is still in effect.
    #[must_use]
    pub fn is_holding(&self, now: Instant) -> bool {
        self.hold_until.is_some_and(|h| now < h)
    }

    /// Clear the pending deadline after a flush. The startup hold is spent.
    pub fn fired(&mut self) {
        self.deadline = None;
        self.first_pending = None;
        self.hold_until = None;
    }

    /// Drop any pending deadline and hold.
    pub fn cancel(&mut self) {
        self.fired();
    }
}
