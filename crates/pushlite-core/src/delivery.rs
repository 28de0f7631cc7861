//! Single-slot delivery queue for close events
//!
//! Delivery is at-least-once. An event is persisted as the pending close
//! event before it is handed out for sending, and is cleared only when the
//! send for that same event is acknowledged. A crash between the two leaves
//! the event pending, and it is replayed on the next launch.
//!
//! There is one slot. Enqueuing a new event overwrites whatever was pending.

use tracing::debug;

use crate::event::CloseEvent;
use crate::profile::DeviceProfileStore;

pub struct DeliveryQueue {
    profile: DeviceProfileStore,
    /// Events handed out for sending and not yet acknowledged
    in_flight: Vec<CloseEvent>,
}

impl DeliveryQueue {
    pub fn new(profile: DeviceProfileStore) -> Self {
        Self {
            profile,
            in_flight: Vec::new(),
        }
    }

    /// Persist `event` as the pending close event and return it for sending
    ///
    /// The write is committed before this returns.
    pub async fn enqueue(&mut self, event: CloseEvent) -> CloseEvent {
        if self.profile.pending_close_event().await.is_some() {
            debug!("Overwriting undelivered close event");
        }
        self.profile.set_pending_close_event(Some(&event)).await;
        self.in_flight.push(event.clone());
        event
    }

    /// The pending event, if it should be sent again
    ///
    /// Returns `None` when nothing is pending or the pending event is already
    /// in flight.
    pub async fn take_replay(&mut self) -> Option<CloseEvent> {
        let pending = self.profile.pending_close_event().await?;
        if self.in_flight.contains(&pending) {
            debug!("Pending close event already in flight, not replaying");
            return None;
        }
        self.in_flight.push(pending.clone());
        Some(pending)
    }

    /// Record the outcome of sending `event`
    ///
    /// Returns `true` if the pending slot was cleared. A successful send of an
    /// event that has since been overwritten leaves the newer event pending.
    pub async fn acknowledge(&mut self, event: &CloseEvent, delivered: bool) -> bool {
        if let Some(index) = self.in_flight.iter().position(|e| e == event) {
            self.in_flight.swap_remove(index);
        }
        if !delivered {
            return false;
        }

        match self.profile.pending_close_event().await {
            Some(pending) if pending == *event => {
                self.profile.set_pending_close_event(None).await;
                true
            }
            Some(_) => {
                debug!("Delivered close event was superseded, keeping newer pending event");
                false
            }
            None => false,
        }
    }

    pub async fn pending(&self) -> Option<CloseEvent> {
        self.profile.pending_close_event().await
    }

    /// Number of sends awaiting acknowledgment
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
