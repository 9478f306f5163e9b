//! Linked timeline segments and chain traversal.
//!
//! A room's history is a chain of [`Segment`]s: contiguous runs of events
//! joined by prev/next links, with pagination tokens at the unexplored ends.
//! Segments live in a [`SegmentArena`] owned by the protocol client; links are
//! [`SegmentId`] handles into that arena rather than owning pointers, so the
//! chain can be doubly linked without reference cycles.
//!
//! ```text
//!   back token                                         forward token
//!   "t0" ◀── [seg 2] ◀──prev── [seg 0] ──next──▶ [seg 1 (live)] ──▶ None
//!             head                                  tail
//! ```
//!
//! Traversal is pure pointer-chasing and cannot fail. It is bounded by the
//! arena size, so a corrupt cyclic link terminates instead of spinning.

use std::sync::Arc;

use parking_lot::RwLock;
use roomline_types::{EventId, RoomEvent};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Handle to a segment inside a [`SegmentArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(usize);

impl SegmentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Pagination / traversal direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards older events.
    Backward,
    /// Towards newer events.
    Forward,
}

impl Direction {
    pub fn from_backwards(backwards: bool) -> Self {
        if backwards {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    pub fn is_backward(&self) -> bool {
        matches!(self, Direction::Backward)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Backward => "backward",
            Direction::Forward => "forward",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A contiguous, ordered run of events (oldest first).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segment {
    events: Vec<RoomEvent>,
    back_token: Option<String>,
    forward_token: Option<String>,
    prev: Option<SegmentId>,
    next: Option<SegmentId>,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<RoomEvent>) -> Self {
        Self { events, ..Self::default() }
    }

    pub fn with_token(mut self, direction: Direction, token: impl Into<String>) -> Self {
        self.set_pagination_token(direction, Some(token.into()));
        self
    }

    pub fn events(&self) -> &[RoomEvent] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut Vec<RoomEvent> {
        &mut self.events
    }

    pub fn push_event(&mut self, event: RoomEvent) {
        self.events.push(event);
    }

    /// Insert older events ahead of the current ones, keeping their order.
    pub fn prepend_events(&mut self, older: Vec<RoomEvent>) {
        self.events.splice(0..0, older);
    }

    pub fn last_event(&self) -> Option<&RoomEvent> {
        self.events.last()
    }

    pub fn contains(&self, event_id: &EventId) -> bool {
        self.events.iter().any(|e| &e.event_id == event_id)
    }

    pub fn pagination_token(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Backward => self.back_token.as_deref(),
            Direction::Forward => self.forward_token.as_deref(),
        }
    }

    pub fn set_pagination_token(&mut self, direction: Direction, token: Option<String>) {
        match direction {
            Direction::Backward => self.back_token = token,
            Direction::Forward => self.forward_token = token,
        }
    }

    pub fn prev(&self) -> Option<SegmentId> {
        self.prev
    }

    pub fn next(&self) -> Option<SegmentId> {
        self.next
    }

    fn neighbour(&self, direction: Direction) -> Option<SegmentId> {
        match direction {
            Direction::Backward => self.prev,
            Direction::Forward => self.next,
        }
    }
}

/// Arena owning every segment of a room.
#[derive(Clone, Debug, Default)]
pub struct SegmentArena {
    segments: Vec<Segment>,
}

/// Arena shared between the protocol client (writer) and timelines (readers).
pub type SharedSegments = Arc<RwLock<SegmentArena>>;

impl SegmentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedSegments {
        Arc::new(RwLock::new(self))
    }

    pub fn insert(&mut self, segment: Segment) -> SegmentId {
        self.segments.push(segment);
        SegmentId(self.segments.len() - 1)
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    pub fn get_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Link `older` → `newer`. Existing links on the touched ends are replaced
    /// and the displaced neighbours lose their back-links.
    ///
    /// Returns false (and changes nothing) if either handle is unknown or the
    /// two are the same segment.
    pub fn link(&mut self, older: SegmentId, newer: SegmentId) -> bool {
        if older == newer || self.get(older).is_none() || self.get(newer).is_none() {
            return false;
        }
        if let Some(old_next) = self.segments[older.0].next.filter(|&n| n != newer) {
            if let Some(seg) = self.get_mut(old_next) {
                seg.prev = None;
            }
        }
        if let Some(old_prev) = self.segments[newer.0].prev.filter(|&p| p != older) {
            if let Some(seg) = self.get_mut(old_prev) {
                seg.next = None;
            }
        }
        self.segments[older.0].next = Some(newer);
        self.segments[newer.0].prev = Some(older);
        true
    }

    /// First segment of the chain containing `id` (no prev link).
    pub fn head(&self, id: SegmentId) -> SegmentId {
        self.end_of_chain(id, Direction::Backward)
    }

    /// Last segment of the chain containing `id` (no next link).
    pub fn tail(&self, id: SegmentId) -> SegmentId {
        self.end_of_chain(id, Direction::Forward)
    }

    fn end_of_chain(&self, id: SegmentId, direction: Direction) -> SegmentId {
        self.chain(id, direction).last().unwrap_or(id)
    }

    /// Iterate the chain from `start` (inclusive) in `direction`.
    pub fn chain(&self, start: SegmentId, direction: Direction) -> Chain<'_> {
        Chain {
            arena: self,
            cursor: self.get(start).map(|_| start),
            direction,
            remaining: self.segments.len(),
        }
    }

    /// Invoke `visitor` on each segment of the chain from `start`.
    pub fn for_each_in_chain(
        &self,
        start: SegmentId,
        direction: Direction,
        mut visitor: impl FnMut(SegmentId, &Segment),
    ) {
        for id in self.chain(start, direction) {
            if let Some(segment) = self.get(id) {
                visitor(id, segment);
            }
        }
    }

    /// Segment holding `event_id`, if any.
    pub fn segment_for_event(&self, event_id: &EventId) -> Option<SegmentId> {
        self.segments
            .iter()
            .position(|s| s.contains(event_id))
            .map(SegmentId)
    }

    pub fn find_event(&self, event_id: &EventId) -> Option<&RoomEvent> {
        self.segments
            .iter()
            .flat_map(|s| s.events.iter())
            .find(|e| &e.event_id == event_id)
    }

    pub fn find_event_mut(&mut self, event_id: &EventId) -> Option<&mut RoomEvent> {
        self.segments
            .iter_mut()
            .flat_map(|s| s.events.iter_mut())
            .find(|e| &e.event_id == event_id)
    }
}

/// Iterator over a segment chain. See [`SegmentArena::chain`].
pub struct Chain<'a> {
    arena: &'a SegmentArena,
    cursor: Option<SegmentId>,
    direction: Direction,
    remaining: usize,
}

impl Iterator for Chain<'_> {
    type Item = SegmentId;

    fn next(&mut self) -> Option<SegmentId> {
        let current = self.cursor?;
        if self.remaining == 0 {
            warn!(?current, "segment chain longer than arena, link cycle?");
            self.cursor = None;
            return None;
        }
        self.remaining -= 1;
        self.cursor = self
            .arena
            .get(current)
            .and_then(|s| s.neighbour(self.direction))
            .filter(|next| self.arena.get(*next).is_some());
        Some(current)
    }
}

// ============================================================================
// Tests
// ============================================================================
