//! Mutation batcher
//!
//! Debounces registration syncs. Every mutation marks the profile dirty and
//! pushes the deadline out by one quiet period; when the deadline passes with
//! the profile still dirty, one registration starts.
//!
//! The batcher owns no timer. The coordinator reads [`MutationBatcher::deadline`]
//! and sleeps until it, then calls [`MutationBatcher::on_timer`]. That keeps
//! this type pure and lets the coordinator replace the deadline on every
//! mutation without cancelling tasks.
//!
//! At most one registration is in flight. A fire that arrives while one is
//! in flight is remembered and runs when the in-flight sync completes, so a
//! stale completion can never clear a flag raised by a later mutation.

use tokio::time::{Duration, Instant};

#[derive(Debug)]
pub struct MutationBatcher {
    quiet_period: Duration,
    dirty: bool,
    deadline: Option<Instant>,
    in_flight: bool,
    deferred: bool,
}

impl MutationBatcher {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            dirty: false,
            deadline: None,
            in_flight: false,
            deferred: false,
        }
    }

    /// Record a mutation at `now`, replacing any scheduled fire
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.deadline = Some(now + self.quiet_period);
    }

    /// When the debounce timer should fire, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// The debounce deadline passed
    ///
    /// Returns `true` if the caller should start a registration now.
    pub fn on_timer(&mut self) -> bool {
        self.deadline = None;
        self.try_start()
    }

    /// Start a registration immediately if there is anything to send
    ///
    /// Cancels the pending timer. Returns `true` if the caller should start a
    /// registration now.
    pub fn flush(&mut self) -> bool {
        self.deadline = None;
        self.try_start()
    }

    /// The in-flight registration finished
    ///
    /// Failure re-arms the dirty flag without scheduling anything; the next
    /// mutation or flush picks it up. Returns `true` if a deferred fire should
    /// start the next registration now.
    pub fn on_complete(&mut self, success: bool) -> bool {
        self.in_flight = false;
        if !success {
            self.dirty = true;
        }

        if std::mem::take(&mut self.deferred) {
            return self.try_start();
        }
        false
    }

    fn try_start(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        if self.in_flight {
            self.deferred = true;
            return false;
        }

        self.dirty = false;
        self.in_flight = true;
        true
    }
}
