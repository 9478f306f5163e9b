//! Live event reconciler.
//!
//! Applies pushed [`ClientEvent`]s to a timeline's state and returns the
//! notifications to broadcast. Handlers never await; the caller holds the
//! state lock for the duration of one event.
//!
//! Encrypted live events are deferred until their decryption lands. How the
//! deferral is tracked depends on
//! [`TimelineConfig::reorder_live_events`](crate::TimelineConfig::reorder_live_events):
//!
//! - **counter** (default): a plain count of pending decryptions. A plaintext
//!   event that arrives while an earlier one is still decrypting is merged
//!   first.
//! - **ordered**: a reorder buffer of arrival slots. Plaintext events queue
//!   behind pending decryptions and the ready prefix is released in arrival
//!   order.

use std::collections::VecDeque;

use roomline_types::{EventId, ReceiptContent, RoomEvent};
use tracing::{debug, trace};

use crate::subscriptions::{ClientEvent, TimelineNotification, TypingUpdate};
use crate::timeline::TimelineState;

// ============================================================================
// Decryption Tracking
// ============================================================================

#[derive(Debug)]
enum Slot {
    Awaiting(EventId),
    Ready(RoomEvent),
}

impl Slot {
    fn event_id(&self) -> &EventId {
        match self {
            Slot::Awaiting(id) => id,
            Slot::Ready(event) => &event.event_id,
        }
    }
}

/// Arrival-ordered buffer of live events, some still decrypting.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    slots: VecDeque<Slot>,
}

impl ReorderBuffer {
    /// Hold a place for an event that is still decrypting.
    pub fn reserve(&mut self, event_id: EventId) {
        self.slots.push_back(Slot::Awaiting(event_id));
    }

    /// Queue a ready event. Released immediately when nothing is pending.
    pub fn push_ready(&mut self, event: RoomEvent) -> Vec<RoomEvent> {
        if self.slots.is_empty() {
            return vec![event];
        }
        self.slots.push_back(Slot::Ready(event));
        Vec::new()
    }

    /// Fill the slot reserved for `event`. Returns `None` when no slot was
    /// reserved for it, otherwise the released prefix (possibly empty).
    pub fn fill(&mut self, event: RoomEvent) -> Option<Vec<RoomEvent>> {
        let index = self
            .slots
            .iter()
            .position(|s| matches!(s, Slot::Awaiting(id) if *id == event.event_id))?;
        self.slots[index] = Slot::Ready(event);
        Some(self.release())
    }

    /// Drop any slot for `event_id` and release what that unblocks.
    pub fn forget(&mut self, event_id: &EventId) -> Vec<RoomEvent> {
        self.slots.retain(|s| s.event_id() != event_id);
        self.release()
    }

    fn release(&mut self) -> Vec<RoomEvent> {
        let mut released = Vec::new();
        while matches!(self.slots.front(), Some(Slot::Ready(_))) {
            if let Some(Slot::Ready(event)) = self.slots.pop_front() {
                released.push(event);
            }
        }
        released
    }

    /// Slots still waiting on decryption.
    pub fn awaiting(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Awaiting(_)))
            .count()
    }

    /// Ready events held behind a pending decryption.
    pub fn held(&self) -> usize {
        self.slots.len() - self.awaiting()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Live events awaiting decryption before merge.
#[derive(Debug)]
pub enum DecryptionTracker {
    Counter(usize),
    Ordered(ReorderBuffer),
}

impl DecryptionTracker {
    pub fn new(reorder: bool) -> Self {
        if reorder {
            DecryptionTracker::Ordered(ReorderBuffer::default())
        } else {
            DecryptionTracker::Counter(0)
        }
    }

    pub fn pending(&self) -> usize {
        match self {
            DecryptionTracker::Counter(n) => *n,
            DecryptionTracker::Ordered(buffer) => buffer.awaiting(),
        }
    }

    /// Forget everything. Called whenever the projection is rebuilt.
    pub fn reset(&mut self) {
        match self {
            DecryptionTracker::Counter(n) => *n = 0,
            DecryptionTracker::Ordered(buffer) => buffer.clear(),
        }
    }

    /// A live event arrived. Returns the events now ready to merge.
    fn arrived(&mut self, event: RoomEvent) -> Vec<RoomEvent> {
        let deferred = event.needs_decryption();
        match self {
            DecryptionTracker::Counter(n) if deferred => {
                *n += 1;
                Vec::new()
            }
            DecryptionTracker::Counter(_) => vec![event],
            DecryptionTracker::Ordered(buffer) if deferred => {
                buffer.reserve(event.event_id);
                Vec::new()
            }
            DecryptionTracker::Ordered(buffer) => buffer.push_ready(event),
        }
    }

    /// A deferred event finished decrypting. `None` means it was not one we
    /// were waiting for.
    fn decrypted(&mut self, event: RoomEvent) -> Option<Vec<RoomEvent>> {
        match self {
            DecryptionTracker::Counter(0) => None,
            DecryptionTracker::Counter(n) => {
                *n -= 1;
                Some(vec![event])
            }
            DecryptionTracker::Ordered(buffer) => buffer.fill(event),
        }
    }

    fn redacted(&mut self, event_id: &EventId) -> Vec<RoomEvent> {
        match self {
            DecryptionTracker::Counter(_) => Vec::new(),
            DecryptionTracker::Ordered(buffer) => buffer.forget(event_id),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

impl TimelineState {
    /// Apply one pushed event. Events for other rooms are dropped.
    pub(crate) fn apply(&mut self, event: ClientEvent) -> Vec<TimelineNotification> {
        if event.room_id() != &self.room_id {
            return Vec::new();
        }
        trace!(room = %self.room_id, kind = event.kind(), "push event");
        match event {
            ClientEvent::Timeline { event, live, .. } => self.on_timeline(event, live),
            ClientEvent::Decrypted { event } => self.on_decrypted(event),
            ClientEvent::Redaction { redacts, .. } => self.on_redaction(&redacts),
            ClientEvent::Typing(update) => self.on_typing(update),
            ClientEvent::Receipt { content, .. } => self.on_receipt(&content),
        }
    }

    fn on_timeline(&mut self, event: RoomEvent, live: bool) -> Vec<TimelineNotification> {
        if self.pagination.is_paginating() || !live || !self.serving_live() {
            return Vec::new();
        }
        // Queued while a rebuild already picked it up from the live segment.
        if self.projection.contains(&event.event_id) {
            trace!(room = %self.room_id, event = %event.event_id, "live event already projected");
            return Vec::new();
        }
        let ready = self.tracker.arrived(event);
        if ready.is_empty() {
            debug!(room = %self.room_id, pending = self.tracker.pending(), "live event held back");
        }
        self.merge(ready)
    }

    fn on_decrypted(&mut self, event: RoomEvent) -> Vec<TimelineNotification> {
        if self.pagination.is_paginating() {
            return Vec::new();
        }
        // A rebuild may already hold it; the counter cannot tell.
        if matches!(self.tracker, DecryptionTracker::Counter(_))
            && (self.projection.contains(&event.event_id) || !self.in_live_segment(&event.event_id))
        {
            return Vec::new();
        }
        match self.tracker.decrypted(event) {
            Some(ready) => self.merge(ready),
            None => Vec::new(),
        }
    }

    fn on_redaction(&mut self, redacts: &EventId) -> Vec<TimelineNotification> {
        self.projection.delete(redacts);
        self.projection.purge_relations(redacts);
        let released = self.tracker.redacted(redacts);
        let mut notes = vec![TimelineNotification::Event(None)];
        notes.extend(self.merge(released));
        notes
    }

    fn on_typing(&mut self, update: TypingUpdate) -> Vec<TimelineNotification> {
        if update.typing {
            self.typing.insert(update.user_id);
        } else {
            self.typing.remove(&update.user_id);
        }
        vec![TimelineNotification::TypingMembersUpdated(self.typing.clone())]
    }

    fn on_receipt(&mut self, content: &ReceiptContent) -> Vec<TimelineNotification> {
        let arena = self.segments.read();
        let last_live = arena.get(self.live).and_then(|s| s.last_event());
        match last_live {
            Some(last) if content.has_read_receipt(&last.event_id) => {
                vec![TimelineNotification::LiveReceipt]
            }
            _ => Vec::new(),
        }
    }

    fn merge(&mut self, events: Vec<RoomEvent>) -> Vec<TimelineNotification> {
        let mut notes = Vec::with_capacity(events.len());
        for event in events {
            if self.projection.contains(&event.event_id) {
                continue;
            }
            self.projection.add(event.clone());
            notes.push(TimelineNotification::event(event));
        }
        notes
    }

    fn in_live_segment(&self, event_id: &EventId) -> bool {
        self.segments
            .read()
            .get(self.live)
            .is_some_and(|s| s.contains(event_id))
    }
}
