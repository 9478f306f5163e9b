//! In-memory protocol client.
//!
//! A [`ProtocolClient`] with no network behind it: rooms, remote history and
//! read markers are seeded by the caller, and every mutation is announced on
//! the push stream the way a syncing client would. Used by the test suite and
//! the `roomline-replay` tool.
//!
//! Remote history is a map of pagination token → [`RemotePage`]. Paginating
//! from a segment looks up its token, inserts the page as a new segment and
//! links it to the boundary.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use roomline_types::{
    ClearEvent, EventId, ReceiptContent, ReceiptType, RoomEvent, RoomId, UserId, event_types,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast};
use tracing::{debug, trace};

use crate::client::{ClientResult, ProtocolClient};
use crate::error::ClientError;
use crate::navigator::{Direction, Segment, SegmentArena, SegmentId, SharedSegments};
use crate::subscriptions::{ClientEvent, TypingUpdate};

const PUSH_CHANNEL_CAPACITY: usize = 1024;

/// One page of remote history, returned for a pagination token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePage {
    /// Chronological order, oldest first, regardless of direction.
    pub events: Vec<RoomEvent>,
    /// Token for the page after this one, in the same direction.
    #[serde(default)]
    pub next_token: Option<String>,
    /// Join the chain onto this segment once the page is inserted.
    #[serde(default)]
    pub joins: Option<SegmentId>,
}

/// Remote context around an event, fetched by
/// [`ProtocolClient::event_timeline`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub events: Vec<RoomEvent>,
    #[serde(default)]
    pub back_token: Option<String>,
    #[serde(default)]
    pub forward_token: Option<String>,
}

#[derive(Debug)]
struct MemoryRoom {
    segments: SharedSegments,
    live: SegmentId,
    encrypted: bool,
    remote_pages: HashMap<String, RemotePage>,
    contexts: HashMap<EventId, EventContext>,
    read_markers: IndexMap<UserId, EventId>,
}

/// Protocol client backed by in-process state.
pub struct MemoryClient {
    user_id: UserId,
    rooms: Mutex<HashMap<RoomId, MemoryRoom>>,
    push: broadcast::Sender<ClientEvent>,
    payloads: Mutex<HashMap<EventId, ClearEvent>>,
    failing_decryptions: Mutex<HashSet<EventId>>,
    decryption_requests: Mutex<Vec<EventId>>,
    pagination_requests: Mutex<Vec<(SegmentId, Direction, usize)>>,
    pagination_failure: Mutex<Option<ClientError>>,
    pagination_gate: Mutex<Option<Arc<Notify>>>,
    sent_receipts: Mutex<Vec<(RoomId, EventId)>>,
}

impl MemoryClient {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        let (push, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self {
            user_id: user_id.into(),
            rooms: Mutex::new(HashMap::new()),
            push,
            payloads: Mutex::new(HashMap::new()),
            failing_decryptions: Mutex::new(HashSet::new()),
            decryption_requests: Mutex::new(Vec::new()),
            pagination_requests: Mutex::new(Vec::new()),
            pagination_failure: Mutex::new(None),
            pagination_gate: Mutex::new(None),
            sent_receipts: Mutex::new(Vec::new()),
        }
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Create a room with one empty live segment.
    pub fn add_room(&self, room_id: RoomId, encrypted: bool) -> (SharedSegments, SegmentId) {
        let mut arena = SegmentArena::new();
        let live = arena.insert(Segment::new());
        let segments = arena.into_shared();
        self.rooms.lock().insert(
            room_id,
            MemoryRoom {
                segments: segments.clone(),
                live,
                encrypted,
                remote_pages: HashMap::new(),
                contexts: HashMap::new(),
                read_markers: IndexMap::new(),
            },
        );
        (segments, live)
    }

    pub fn segments(&self, room_id: &RoomId) -> Option<SharedSegments> {
        self.rooms.lock().get(room_id).map(|r| r.segments.clone())
    }

    /// Serve `page` for pagination token `token`.
    pub fn add_remote_page(&self, room_id: &RoomId, token: impl Into<String>, page: RemotePage) {
        if let Some(room) = self.rooms.lock().get_mut(room_id) {
            room.remote_pages.insert(token.into(), page);
        }
    }

    /// Serve `context` when the timeline around `event_id` is requested.
    pub fn add_event_context(&self, room_id: &RoomId, event_id: impl Into<EventId>, context: EventContext) {
        if let Some(room) = self.rooms.lock().get_mut(room_id) {
            room.contexts.insert(event_id.into(), context);
        }
    }

    pub fn set_read_up_to(&self, room_id: &RoomId, user_id: impl Into<UserId>, event_id: impl Into<EventId>) {
        if let Some(room) = self.rooms.lock().get_mut(room_id) {
            room.read_markers.insert(user_id.into(), event_id.into());
        }
    }

    /// Payload that decrypting `event_id` yields. Events without one decrypt
    /// to a text message whose body is the event id.
    pub fn set_decrypted_payload(&self, event_id: impl Into<EventId>, clear: ClearEvent) {
        self.payloads.lock().insert(event_id.into(), clear);
    }

    pub fn fail_decryption(&self, event_id: impl Into<EventId>) {
        self.failing_decryptions.lock().insert(event_id.into());
    }

    /// Make the next pagination call fail with `error`.
    pub fn fail_next_pagination(&self, error: ClientError) {
        *self.pagination_failure.lock() = Some(error);
    }

    /// Hold every pagination call until the returned gate is notified once
    /// per call.
    pub fn pause_pagination(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.pagination_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn resume_pagination(&self) {
        if let Some(gate) = self.pagination_gate.lock().take() {
            gate.notify_waiters();
        }
    }

    // ========================================================================
    // Pushes
    // ========================================================================

    /// Broadcast `event` to subscribers. Returns how many received it.
    pub fn emit(&self, event: ClientEvent) -> usize {
        trace!(kind = event.kind(), room = %event.room_id(), "push");
        self.push.send(event).unwrap_or(0)
    }

    /// Append `event` to the live segment and push it as a live event.
    pub fn push_live_event(&self, event: RoomEvent) -> bool {
        let room_id = event.room_id.clone();
        let Some((segments, live)) = self.live_target(&room_id) else {
            return false;
        };
        if let Some(segment) = segments.write().get_mut(live) {
            segment.push_event(event.clone());
        }
        self.emit(ClientEvent::Timeline { room_id, event, live: true });
        true
    }

    /// Decrypt `event_id` in place and push the result, as a background
    /// decryption would.
    pub fn complete_decryption(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<()> {
        let segments = self
            .segments(room_id)
            .ok_or_else(|| ClientError::UnknownRoom(room_id.clone()))?;
        let failing = self.failing_decryptions.lock().contains(event_id);

        let event = {
            let mut arena = segments.write();
            let event = arena
                .find_event_mut(event_id)
                .ok_or_else(|| ClientError::EventNotFound(event_id.clone()))?;
            if !failing && event.needs_decryption() {
                event.set_clear(self.payload_for(event_id));
            }
            event.clone()
        };
        // Announced on failure too; the event stays undecrypted.
        self.emit(ClientEvent::Decrypted { event });

        if failing {
            return Err(ClientError::Decryption {
                event_id: event_id.clone(),
                reason: "no session key".into(),
            });
        }
        Ok(())
    }

    /// Redact `event_id` in storage and push the redaction.
    pub fn redact(&self, room_id: &RoomId, event_id: &EventId) -> bool {
        let Some(segments) = self.segments(room_id) else {
            return false;
        };
        let found = match segments.write().find_event_mut(event_id) {
            Some(event) => {
                event.redact();
                true
            }
            None => false,
        };
        self.emit(ClientEvent::Redaction {
            room_id: room_id.clone(),
            redacts: event_id.clone(),
        });
        found
    }

    pub fn set_typing(&self, room_id: &RoomId, user_id: impl Into<UserId>, typing: bool) {
        self.emit(ClientEvent::Typing(TypingUpdate {
            room_id: room_id.clone(),
            user_id: user_id.into(),
            typing,
        }));
    }

    /// Apply the `m.read` receipts in `content` to the read markers and push
    /// the receipt event.
    pub fn receive_receipts(&self, room_id: &RoomId, content: ReceiptContent) {
        if let Some(room) = self.rooms.lock().get_mut(room_id) {
            for event_id in content.event_ids() {
                let readers = content
                    .for_event(event_id)
                    .and_then(|by_type| by_type.get(&ReceiptType::Read));
                for user_id in readers.into_iter().flat_map(|users| users.keys()) {
                    room.read_markers.insert(user_id.clone(), event_id.clone());
                }
            }
        }
        self.emit(ClientEvent::Receipt {
            room_id: room_id.clone(),
            content,
        });
    }

    // ========================================================================
    // Recorded calls
    // ========================================================================

    pub fn decryption_requests(&self) -> Vec<EventId> {
        self.decryption_requests.lock().clone()
    }

    pub fn pagination_requests(&self) -> Vec<(SegmentId, Direction, usize)> {
        self.pagination_requests.lock().clone()
    }

    pub fn sent_receipts(&self) -> Vec<(RoomId, EventId)> {
        self.sent_receipts.lock().clone()
    }

    fn live_target(&self, room_id: &RoomId) -> Option<(SharedSegments, SegmentId)> {
        self.rooms
            .lock()
            .get(room_id)
            .map(|r| (r.segments.clone(), r.live))
    }

    fn payload_for(&self, event_id: &EventId) -> ClearEvent {
        self.payloads.lock().get(event_id).cloned().unwrap_or_else(|| {
            ClearEvent::new(
                event_types::ROOM_MESSAGE,
                serde_json::json!({ "msgtype": "m.text", "body": event_id.as_str() }),
            )
        })
    }

    /// Insert the page for `token` next to `boundary`. Returns whether the
    /// server has more in `direction`.
    fn apply_page(
        &self,
        room_id: &RoomId,
        boundary: SegmentId,
        direction: Direction,
        limit: usize,
    ) -> ClientResult<bool> {
        let mut rooms = self.rooms.lock();
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ClientError::UnknownRoom(room_id.clone()))?;
        let mut arena = room.segments.write();

        let token = arena
            .get(boundary)
            .ok_or(ClientError::UnknownSegment(boundary))?
            .pagination_token(direction)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Rejected(format!("no {direction} token")))?;
        let mut page = room
            .remote_pages
            .remove(&token)
            .ok_or_else(|| ClientError::Rejected(format!("unknown token {token:?}")))?;

        // Oversized pages are split; the remainder stays on the server.
        if page.events.len() > limit {
            let split_at = match direction {
                Direction::Backward => page.events.len() - limit,
                Direction::Forward => limit,
            };
            let tail = page.events.split_off(split_at);
            let (served, rest) = match direction {
                Direction::Backward => (tail, std::mem::take(&mut page.events)),
                Direction::Forward => (std::mem::take(&mut page.events), tail),
            };
            let rest_token = format!("{token}+{limit}");
            room.remote_pages.insert(
                rest_token.clone(),
                RemotePage {
                    events: rest,
                    next_token: page.next_token.take(),
                    joins: page.joins.take(),
                },
            );
            page = RemotePage {
                events: served,
                next_token: Some(rest_token),
                joins: None,
            };
        }

        let can_paginate_more = page.next_token.is_some();
        let loaded = page.events.len();
        let mut edge = boundary;
        if let Some(boundary_segment) = arena.get_mut(boundary) {
            boundary_segment.set_pagination_token(direction, None);
        }
        if !page.events.is_empty() {
            let segment = Segment::with_events(page.events);
            edge = arena.insert(segment);
            match direction {
                Direction::Backward => arena.link(edge, boundary),
                Direction::Forward => arena.link(boundary, edge),
            };
        }
        if let Some(segment) = arena.get_mut(edge) {
            segment.set_pagination_token(direction, page.next_token);
        }
        if let Some(target) = page.joins {
            let joined = match direction {
                Direction::Backward => arena.link(target, edge),
                Direction::Forward => arena.link(edge, target),
            };
            trace!(?edge, ?target, joined, "joined chains");
        }

        debug!(room = %room_id, %direction, loaded, can_paginate_more, "served remote page");
        Ok(can_paginate_more)
    }
}

impl std::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClient")
            .field("user_id", &self.user_id)
            .field("rooms", &self.rooms.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProtocolClient for MemoryClient {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn room_segments(&self, room_id: &RoomId) -> Option<SharedSegments> {
        self.segments(room_id)
    }

    fn live_segment(&self, room_id: &RoomId) -> Option<SegmentId> {
        self.rooms.lock().get(room_id).map(|r| r.live)
    }

    fn is_room_encrypted(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().get(room_id).is_some_and(|r| r.encrypted)
    }

    fn users_read_up_to(&self, room_id: &RoomId, event_id: &EventId) -> Vec<UserId> {
        self.rooms
            .lock()
            .get(room_id)
            .map(|r| {
                r.read_markers
                    .iter()
                    .filter(|(_, marker)| *marker == event_id)
                    .map(|(user, _)| user.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn event_read_up_to(&self, room_id: &RoomId, user_id: &UserId) -> Option<EventId> {
        self.rooms
            .lock()
            .get(room_id)
            .and_then(|r| r.read_markers.get(user_id).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.push.subscribe()
    }

    async fn event_timeline(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<SegmentId> {
        let mut rooms = self.rooms.lock();
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ClientError::UnknownRoom(room_id.clone()))?;
        let mut arena = room.segments.write();
        if let Some(existing) = arena.segment_for_event(event_id) {
            return Ok(existing);
        }
        let context = room
            .contexts
            .remove(event_id)
            .ok_or_else(|| ClientError::EventNotFound(event_id.clone()))?;
        let mut segment = Segment::with_events(context.events);
        segment.set_pagination_token(Direction::Backward, context.back_token);
        segment.set_pagination_token(Direction::Forward, context.forward_token);
        Ok(arena.insert(segment))
    }

    async fn paginate_segment(
        &self,
        room_id: &RoomId,
        segment: SegmentId,
        direction: Direction,
        limit: usize,
    ) -> ClientResult<bool> {
        self.pagination_requests.lock().push((segment, direction, limit));

        let gate = self.pagination_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(error) = self.pagination_failure.lock().take() {
            return Err(error);
        }
        self.apply_page(room_id, segment, direction, limit)
    }

    async fn decrypt_event(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<()> {
        self.decryption_requests.lock().push(event_id.clone());
        self.complete_decryption(room_id, event_id)
    }

    async fn send_read_receipt(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<()> {
        self.sent_receipts
            .lock()
            .push((room_id.clone(), event_id.clone()));
        self.set_read_up_to(room_id, self.user_id.clone(), event_id.clone());
        Ok(())
    }
}
