//! The protocol client contract.
//!
//! The timeline engine owns no network, crypto, or storage. Everything it
//! knows about a room comes through [`ProtocolClient`]: the shared segment
//! arena, the live segment handle, read markers, and a push stream of
//! [`ClientEvent`]s.

use async_trait::async_trait;
use roomline_types::{EventId, RoomId, UserId};
use tokio::sync::broadcast;

use crate::error::ClientError;
use crate::navigator::{Direction, SegmentId, SharedSegments};
use crate::subscriptions::ClientEvent;

pub type ClientResult<T> = Result<T, ClientError>;

/// What a timeline needs from the protocol client.
///
/// Synchronous methods read local state and must not block on the network.
/// Async methods may suspend; a timeline never holds its own lock across
/// them.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    // ========================================================================
    // Local state
    // ========================================================================

    /// The signed-in user.
    fn user_id(&self) -> &UserId;

    /// Segment arena for `room_id`, or `None` for an unknown room.
    fn room_segments(&self, room_id: &RoomId) -> Option<SharedSegments>;

    /// The segment receiving real-time events for `room_id`.
    fn live_segment(&self, room_id: &RoomId) -> Option<SegmentId>;

    fn is_room_encrypted(&self, room_id: &RoomId) -> bool;

    /// Users whose read marker sits on `event_id`.
    fn users_read_up_to(&self, room_id: &RoomId, event_id: &EventId) -> Vec<UserId>;

    /// Where `user_id` has read up to in `room_id`.
    fn event_read_up_to(&self, room_id: &RoomId, user_id: &UserId) -> Option<EventId>;

    /// Push stream for every room this client syncs.
    fn subscribe(&self) -> broadcast::Receiver<ClientEvent>;

    // ========================================================================
    // Remote operations
    // ========================================================================

    /// Fetch the context around `event_id` into a segment (new or existing)
    /// and return its handle.
    async fn event_timeline(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<SegmentId>;

    /// Extend the chain at `segment` by up to `limit` events in `direction`.
    ///
    /// On success the arena has been updated. Returns whether the server has
    /// more events beyond the new boundary.
    async fn paginate_segment(
        &self,
        room_id: &RoomId,
        segment: SegmentId,
        direction: Direction,
        limit: usize,
    ) -> ClientResult<bool>;

    /// Decrypt `event_id` in place. Completion is also announced with
    /// [`ClientEvent::Decrypted`].
    async fn decrypt_event(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<()>;

    async fn send_read_receipt(&self, room_id: &RoomId, event_id: &EventId) -> ClientResult<()>;
}
