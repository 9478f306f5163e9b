//! Local projection store: the derived views of a room timeline.
//!
//! Three containers rebuilt from raw segments:
//!
//! - **main sequence**: supported, non-redacted, non-relation events in order
//! - **edit index**: target id → `m.replace` events, in arrival order
//! - **reaction index**: target id → `m.reaction` events, in arrival order
//!
//! The projection is never trusted across an active-timeline switch: every
//! switch goes through [`Projection::populate`]. Only the live fast path
//! appends incrementally.

use std::collections::HashMap;

use roomline_types::{EventId, RoomEvent};
use tracing::trace;

use crate::classify::{EventClass, classify};
use crate::navigator::{Direction, SegmentArena, SegmentId};

#[derive(Debug, Clone, Default)]
pub struct Projection {
    timeline: Vec<RoomEvent>,
    edits: HashMap<EventId, Vec<RoomEvent>>,
    reactions: HashMap<EventId, Vec<RoomEvent>>,
    supported_types: Vec<String>,
}

impl Projection {
    pub fn new(supported_types: Vec<String>) -> Self {
        Self {
            supported_types,
            ..Self::default()
        }
    }

    /// Empty all three containers.
    pub fn clear(&mut self) {
        self.timeline.clear();
        self.edits.clear();
        self.reactions.clear();
    }

    /// Classify `event` and route it into the matching container.
    pub fn add(&mut self, event: RoomEvent) -> EventClass {
        let class = classify(&event, &self.supported_types);
        match &class {
            EventClass::Main => self.timeline.push(event),
            EventClass::Edit(target) => self.edits.entry(target.clone()).or_default().push(event),
            EventClass::Reaction(target) => {
                self.reactions.entry(target.clone()).or_default().push(event)
            }
            EventClass::Ignored(reason) => {
                trace!(event_id = %event.event_id, ?reason, "event left out of projection");
            }
        }
        class
    }

    /// Remove the first main-sequence event with `event_id`.
    ///
    /// Returns `None` when absent. Edit and reaction entries are untouched;
    /// see [`purge_relations`](Self::purge_relations).
    pub fn delete(&mut self, event_id: &EventId) -> Option<RoomEvent> {
        let index = self.index_of(event_id)?;
        Some(self.timeline.remove(index))
    }

    /// Drop edit and reaction entries keyed by `event_id`.
    pub fn purge_relations(&mut self, event_id: &EventId) {
        self.edits.remove(event_id);
        self.reactions.remove(event_id);
    }

    /// Rebuild from every segment of the chain containing `active`, head to
    /// tail. Returns the new main-sequence length.
    pub fn populate(&mut self, arena: &SegmentArena, active: SegmentId) -> usize {
        self.clear();
        let head = arena.head(active);
        for id in arena.chain(head, Direction::Forward) {
            if let Some(segment) = arena.get(id) {
                for event in segment.events() {
                    self.add(event.clone());
                }
            }
        }
        self.timeline.len()
    }

    pub fn events(&self) -> &[RoomEvent] {
        &self.timeline
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn last(&self) -> Option<&RoomEvent> {
        self.timeline.last()
    }

    pub fn index_of(&self, event_id: &EventId) -> Option<usize> {
        self.timeline.iter().position(|e| &e.event_id == event_id)
    }

    pub fn find(&self, event_id: &EventId) -> Option<&RoomEvent> {
        self.index_of(event_id).map(|i| &self.timeline[i])
    }

    /// Whether `event_id` is held in any container.
    pub fn contains(&self, event_id: &EventId) -> bool {
        self.index_of(event_id).is_some()
            || self
                .edits
                .values()
                .chain(self.reactions.values())
                .flatten()
                .any(|e| &e.event_id == event_id)
    }

    pub fn edits_for(&self, event_id: &EventId) -> &[RoomEvent] {
        self.edits.get(event_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn reactions_for(&self, event_id: &EventId) -> &[RoomEvent] {
        self.reactions.get(event_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn edits(&self) -> &HashMap<EventId, Vec<RoomEvent>> {
        &self.edits
    }

    pub fn reactions(&self) -> &HashMap<EventId, Vec<RoomEvent>> {
        &self.reactions
    }
}

// ============================================================================
// Tests
// ============================================================================
