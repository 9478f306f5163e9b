//! RoomTimeline: the per-room projection and consistency engine.
//!
//! A [`RoomTimeline`] keeps a projection of one room's segment chain up to
//! date. Bulk rebuilds happen on load and pagination; between them the
//! listener task applies live pushes incrementally.
//!
//! # Locking
//!
//! All mutable state sits behind one `parking_lot::Mutex`, never held across
//! an `.await`. Async operations suspend only at protocol client calls and
//! decryption; pushes handled meanwhile see a consistent state. Lock order is
//! timeline state, then segment arena.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::Mutex;
use roomline_types::{EventId, RoomEvent, RoomId, UserId};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::client::{ClientResult, ProtocolClient};
use crate::config::TimelineConfig;
use crate::decrypt::decrypt_chain;
use crate::error::ClientError;
use crate::live::DecryptionTracker;
use crate::navigator::{Direction, SegmentId, SharedSegments};
use crate::pagination::{PaginationGuard, PaginationState};
use crate::projection::Projection;
use crate::read_state;
use crate::subscriptions::{ClientEvent, ListenerHandle, TimelineNotification};

/// Mutable state of a timeline. Owned by [`TimelineInner`], always locked.
#[derive(Debug)]
pub(crate) struct TimelineState {
    pub(crate) room_id: RoomId,
    pub(crate) segments: SharedSegments,
    pub(crate) live: SegmentId,
    pub(crate) active: SegmentId,
    pub(crate) projection: Projection,
    pub(crate) tracker: DecryptionTracker,
    pub(crate) pagination: PaginationState,
    pub(crate) typing: BTreeSet<UserId>,
    pub(crate) initialized: bool,
}

impl TimelineState {
    pub(crate) fn serving_live(&self) -> bool {
        self.segments.read().tail(self.active) == self.live
    }

    /// Rebuild the projection from the active chain. Returns the new main
    /// sequence length.
    fn rebuild(&mut self) -> usize {
        let arena = self.segments.read();
        let len = self.projection.populate(&arena, self.active);
        self.tracker.reset();
        len
    }
}

struct TimelineInner {
    client: Arc<dyn ProtocolClient>,
    room_id: RoomId,
    segments: SharedSegments,
    live: SegmentId,
    config: TimelineConfig,
    state: Mutex<TimelineState>,
    notifications: broadcast::Sender<TimelineNotification>,
    listener: Mutex<ListenerHandle>,
}

impl TimelineInner {
    fn emit(&self, notification: TimelineNotification) {
        trace!(room = %self.room_id, ?notification, "notify");
        // No receivers is fine.
        let _ = self.notifications.send(notification);
    }

    fn handle(&self, event: ClientEvent) {
        let notifications = self.state.lock().apply(event);
        for notification in notifications {
            self.emit(notification);
        }
    }
}

/// Consistent local view of one room's timeline.
///
/// Construct with [`RoomTimeline::new`], then call
/// [`load_live_timeline`](Self::load_live_timeline) or
/// [`load_event_timeline`](Self::load_event_timeline). The first successful
/// load starts listening to the client's push stream; observers follow
/// changes via [`subscribe`](Self::subscribe).
pub struct RoomTimeline {
    inner: Arc<TimelineInner>,
}

impl RoomTimeline {
    /// Bind a timeline to `room_id`. Fails with
    /// [`ClientError::UnknownRoom`] when the client has no such room.
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        room_id: RoomId,
        config: TimelineConfig,
    ) -> Result<Self, ClientError> {
        let segments = client
            .room_segments(&room_id)
            .ok_or_else(|| ClientError::UnknownRoom(room_id.clone()))?;
        let live = client
            .live_segment(&room_id)
            .ok_or_else(|| ClientError::UnknownRoom(room_id.clone()))?;

        let state = TimelineState {
            room_id: room_id.clone(),
            segments: segments.clone(),
            live,
            active: live,
            projection: Projection::new(config.supported_event_types.clone()),
            tracker: DecryptionTracker::new(config.reorder_live_events),
            pagination: PaginationState::default(),
            typing: BTreeSet::new(),
            initialized: false,
        };
        let (notifications, _) = broadcast::channel(config.notification_capacity);

        debug!(room = %room_id, ?live, reorder = config.reorder_live_events, "timeline created");
        Ok(Self {
            inner: Arc::new(TimelineInner {
                client,
                room_id,
                segments,
                live,
                config,
                state: Mutex::new(state),
                notifications,
                listener: Mutex::new(ListenerHandle::inactive()),
            }),
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.inner.room_id
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineNotification> {
        self.inner.notifications.subscribe()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// View the live timeline. Always succeeds.
    pub async fn load_live_timeline(&self) -> bool {
        self.reset(self.inner.live, None).await;
        true
    }

    /// View the timeline around `event_id`. Returns false if the client
    /// could not locate it.
    pub async fn load_event_timeline(&self, event_id: &EventId) -> bool {
        let inner = &self.inner;
        match inner.client.event_timeline(&inner.room_id, event_id).await {
            Ok(segment) => {
                self.reset(segment, Some(event_id.clone())).await;
                true
            }
            Err(e) => {
                warn!(room = %inner.room_id, event = %event_id, "failed to load event timeline: {e}");
                false
            }
        }
    }

    async fn reset(&self, active: SegmentId, event_id: Option<EventId>) {
        let inner = &self.inner;
        inner.state.lock().active = active;

        if self.is_encrypted() {
            decrypt_chain(inner.client.as_ref(), &inner.room_id, &inner.segments, active).await;
        }

        let (len, first_load) = {
            let mut state = inner.state.lock();
            // A concurrent load may have switched the view while we decrypted.
            state.active = active;
            let len = state.rebuild();
            let first_load = !state.initialized;
            state.initialized = true;
            (len, first_load)
        };

        if first_load {
            self.start_listener();
        }
        info!(room = %inner.room_id, ?active, events = len, "timeline ready");
        inner.emit(TimelineNotification::Ready { event_id });
    }

    fn start_listener(&self) {
        let weak: Weak<TimelineInner> = Arc::downgrade(&self.inner);
        let handle = ListenerHandle::spawn(self.inner.client.subscribe(), move |event| {
            match weak.upgrade() {
                Some(inner) => {
                    inner.handle(event);
                    true
                }
                None => false,
            }
        });
        *self.inner.listener.lock() = handle;
    }

    // ========================================================================
    // Pagination
    // ========================================================================

    /// Extend the active chain by up to `limit` events (default
    /// [`TimelineConfig::page_size`]) in `direction`.
    ///
    /// Returns false without side effects when not initialized or a
    /// pagination is already in flight. Otherwise emits exactly one
    /// [`TimelineNotification::Paginated`] and returns whether the client
    /// call succeeded.
    pub async fn paginate_timeline(&self, direction: Direction, limit: Option<usize>) -> bool {
        let inner = &self.inner;

        let (guard, boundary, has_token, old_len) = {
            let mut state = inner.state.lock();
            if !state.initialized {
                debug!(room = %inner.room_id, "pagination before load");
                return false;
            }
            let Some(guard) = PaginationGuard::begin(&inner.state, &mut state, direction) else {
                debug!(room = %inner.room_id, %direction, "pagination already in flight");
                return false;
            };
            let arena = inner.segments.read();
            let boundary = match direction {
                Direction::Backward => arena.head(state.active),
                Direction::Forward => arena.tail(state.active),
            };
            let has_token = arena
                .get(boundary)
                .and_then(|s| s.pagination_token(direction))
                .is_some();
            (guard, boundary, has_token, state.projection.len())
        };

        if !has_token {
            drop(guard);
            inner.emit(TimelineNotification::Paginated {
                direction,
                loaded: 0,
                can_paginate_more: false,
            });
            return false;
        }

        let limit = limit.unwrap_or(inner.config.page_size);
        let result = inner
            .client
            .paginate_segment(&inner.room_id, boundary, direction, limit)
            .await;

        match result {
            Ok(can_paginate_more) => {
                if self.is_encrypted() {
                    let active = inner.state.lock().active;
                    decrypt_chain(inner.client.as_ref(), &inner.room_id, &inner.segments, active).await;
                }
                let loaded = inner.state.lock().rebuild().saturating_sub(old_len);
                drop(guard);
                info!(room = %inner.room_id, %direction, loaded, can_paginate_more, "paginated");
                inner.emit(TimelineNotification::Paginated {
                    direction,
                    loaded,
                    can_paginate_more,
                });
                true
            }
            Err(e) => {
                drop(guard);
                warn!(room = %inner.room_id, %direction, "pagination failed: {e}");
                inner.emit(TimelineNotification::Paginated {
                    direction,
                    loaded: 0,
                    can_paginate_more: true,
                });
                false
            }
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Whether the active chain ends at the live segment.
    pub fn is_serving_live_timeline(&self) -> bool {
        self.inner.state.lock().serving_live()
    }

    pub fn can_paginate_backward(&self) -> bool {
        let state = self.inner.state.lock();
        let arena = self.inner.segments.read();
        arena
            .get(arena.head(state.active))
            .and_then(|s| s.pagination_token(Direction::Backward))
            .is_some()
    }

    pub fn can_paginate_forward(&self) -> bool {
        !self.is_serving_live_timeline()
    }

    pub fn is_encrypted(&self) -> bool {
        self.inner.client.is_room_encrypted(&self.inner.room_id)
    }

    pub fn live_segment(&self) -> SegmentId {
        self.inner.live
    }

    pub fn active_segment(&self) -> SegmentId {
        self.inner.state.lock().active
    }

    // ========================================================================
    // Projection queries
    // ========================================================================

    /// Snapshot of the main sequence.
    pub fn events(&self) -> Vec<RoomEvent> {
        self.inner.state.lock().projection.events().to_vec()
    }

    pub fn event_index(&self, event_id: &EventId) -> Option<usize> {
        self.inner.state.lock().projection.index_of(event_id)
    }

    pub fn find_event_by_id(&self, event_id: &EventId) -> Option<RoomEvent> {
        self.inner.state.lock().projection.find(event_id).cloned()
    }

    /// Look `event_id` up in every segment of the room, projected or not.
    pub fn find_event_in_timeline_set(&self, event_id: &EventId) -> Option<RoomEvent> {
        self.inner.segments.read().find_event(event_id).cloned()
    }

    pub fn has_event_in_live_timeline(&self, event_id: &EventId) -> bool {
        self.inner.segments.read().segment_for_event(event_id) == Some(self.inner.live)
    }

    pub fn has_event_in_active_timeline(&self, event_id: &EventId) -> bool {
        let active = self.inner.state.lock().active;
        self.inner.segments.read().segment_for_event(event_id) == Some(active)
    }

    pub fn edits_for(&self, event_id: &EventId) -> Vec<RoomEvent> {
        self.inner.state.lock().projection.edits_for(event_id).to_vec()
    }

    pub fn reactions_for(&self, event_id: &EventId) -> Vec<RoomEvent> {
        self.inner.state.lock().projection.reactions_for(event_id).to_vec()
    }

    /// Remove `event_id` from the main sequence.
    pub fn delete_from_timeline(&self, event_id: &EventId) -> Option<RoomEvent> {
        self.inner.state.lock().projection.delete(event_id)
    }

    pub fn typing_members(&self) -> BTreeSet<UserId> {
        self.inner.state.lock().typing.clone()
    }

    /// Live events waiting on decryption before they can be merged.
    pub fn pending_decryptions(&self) -> usize {
        self.inner.state.lock().tracker.pending()
    }

    pub fn is_paginating(&self) -> bool {
        self.inner.state.lock().pagination.is_paginating()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    // ========================================================================
    // Read state
    // ========================================================================

    /// Readers of the newest projected event and of the live tail.
    pub fn live_readers(&self) -> IndexSet<UserId> {
        let (last_projected, last_live) = {
            let state = self.inner.state.lock();
            let arena = self.inner.segments.read();
            (
                state.projection.last().map(|e| e.event_id.clone()),
                arena
                    .get(self.inner.live)
                    .and_then(|s| s.last_event())
                    .map(|e| e.event_id.clone()),
            )
        };
        read_state::live_readers(
            self.inner.client.as_ref(),
            &self.inner.room_id,
            last_projected.as_ref(),
            last_live.as_ref(),
        )
    }

    /// Everyone who has read `event_id` or anything projected after it.
    /// Falls back to [`live_readers`](Self::live_readers) for an unknown id.
    pub fn event_readers(&self, event_id: &EventId) -> IndexSet<UserId> {
        let following: Option<Vec<EventId>> = {
            let state = self.inner.state.lock();
            let events = state.projection.events();
            state
                .projection
                .index_of(event_id)
                .map(|i| events[i..].iter().map(|e| e.event_id.clone()).collect())
        };
        match following {
            Some(ids) => read_state::readers_of(self.inner.client.as_ref(), &self.inner.room_id, &ids),
            None => self.live_readers(),
        }
    }

    /// Where the signed-in user has read up to.
    pub fn read_up_to_event_id(&self) -> Option<EventId> {
        let client = &self.inner.client;
        client.event_read_up_to(&self.inner.room_id, client.user_id())
    }

    /// Send a read receipt for the newest projected event unless the user's
    /// marker is already there. Returns whether a receipt was sent.
    pub async fn mark_as_read(&self) -> ClientResult<bool> {
        let Some(latest) = self.inner.state.lock().projection.last().map(|e| e.event_id.clone())
        else {
            return Ok(false);
        };
        if self.read_up_to_event_id().as_ref() == Some(&latest) {
            return Ok(false);
        }
        self.inner
            .client
            .send_read_receipt(&self.inner.room_id, &latest)
            .await?;
        debug!(room = %self.inner.room_id, event = %latest, "read receipt sent");
        Ok(true)
    }

    // ========================================================================
    // Push events and lifecycle
    // ========================================================================

    /// Apply one pushed event and broadcast the resulting notifications.
    ///
    /// The listener started by the first load already feeds every push
    /// through here; call it directly only for events the client does not
    /// broadcast.
    pub fn handle_client_event(&self, event: ClientEvent) {
        self.inner.handle(event);
    }

    /// Stop listening to the client. Returns true the first time.
    pub fn teardown(&self) -> bool {
        let disposed = self.inner.listener.lock().dispose();
        if disposed {
            info!(room = %self.inner.room_id, "timeline torn down");
        }
        disposed
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listener.lock().is_active()
    }
}

impl std::fmt::Debug for RoomTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomTimeline")
            .field("room_id", &self.inner.room_id)
            .field("live", &self.inner.live)
            .finish_non_exhaustive()
    }
}
