//! Push events in, notifications out.
//!
//! Provides [`ClientEvent`], the typed enum of everything the protocol
//! client pushes, and [`TimelineNotification`], what a
//! [`RoomTimeline`](crate::RoomTimeline) tells its observers. Both travel on
//! tokio broadcast channels.
//!
//! [`ListenerHandle`] is the disposer for the task that forwards a client's
//! push stream into a timeline.

use std::collections::BTreeSet;

use roomline_types::{EventId, ReceiptContent, RoomEvent, RoomId, UserId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::navigator::Direction;

// ============================================================================
// Event Types
// ============================================================================

/// A member started or stopped typing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypingUpdate {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub typing: bool,
}

/// Events pushed from the protocol client, for every room it syncs.
///
/// Subscribe via [`ProtocolClient::subscribe`](crate::ProtocolClient::subscribe).
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// An event was added to a room timeline.
    Timeline {
        room_id: RoomId,
        event: RoomEvent,
        /// False for events added by pagination or backfill.
        live: bool,
    },
    /// An event was redacted.
    Redaction { room_id: RoomId, redacts: EventId },
    /// Decryption of an event finished (successfully or not).
    Decrypted { event: RoomEvent },
    /// A member's typing state changed.
    Typing(TypingUpdate),
    /// Receipts arrived for a room.
    Receipt { room_id: RoomId, content: ReceiptContent },
}

impl ClientEvent {
    /// The room this event concerns.
    pub fn room_id(&self) -> &RoomId {
        match self {
            ClientEvent::Timeline { room_id, .. }
            | ClientEvent::Redaction { room_id, .. }
            | ClientEvent::Receipt { room_id, .. } => room_id,
            ClientEvent::Decrypted { event } => &event.room_id,
            ClientEvent::Typing(update) => &update.room_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Timeline { .. } => "timeline",
            ClientEvent::Redaction { .. } => "redaction",
            ClientEvent::Decrypted { .. } => "decrypted",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::Receipt { .. } => "receipt",
        }
    }
}

/// What a timeline tells its observers.
///
/// Subscribe via [`RoomTimeline::subscribe`](crate::RoomTimeline::subscribe).
#[derive(Clone, Debug, PartialEq)]
pub enum TimelineNotification {
    /// The projection was rebuilt for a new active timeline. `event_id` is
    /// the event the view was opened at, `None` for the live timeline.
    Ready { event_id: Option<EventId> },
    /// A pagination call finished.
    Paginated {
        direction: Direction,
        loaded: usize,
        can_paginate_more: bool,
    },
    /// The projection changed. Carries the merged event for live merges,
    /// `None` when something was removed.
    Event(Option<Box<RoomEvent>>),
    /// Fresh snapshot of who is typing.
    TypingMembersUpdated(BTreeSet<UserId>),
    /// Someone read the latest live event; re-query readers.
    LiveReceipt,
}

impl TimelineNotification {
    pub fn event(event: RoomEvent) -> Self {
        TimelineNotification::Event(Some(Box::new(event)))
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Disposer for a push-event listener task.
///
/// [`dispose`](Self::dispose) aborts the task; it is safe to call any number
/// of times and runs on drop.
#[derive(Debug, Default)]
pub struct ListenerHandle {
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Spawn a task feeding every received event to `handler` until the
    /// channel closes or `handler` returns false.
    pub fn spawn<F>(mut rx: broadcast::Receiver<ClientEvent>, mut handler: F) -> Self
    where
        F: FnMut(ClientEvent) -> bool + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if !handler(event) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "listener lagged behind client push stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("listener stopped");
        });
        Self { task: Some(task) }
    }

    /// A handle with nothing to dispose.
    pub fn inactive() -> Self {
        Self { task: None }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop listening. Returns true the first time, false afterwards.
    pub fn dispose(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
