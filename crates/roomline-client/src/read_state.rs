//! Who has read what, derived from the client's read markers.

use indexmap::IndexSet;
use roomline_types::{EventId, RoomId, UserId};

use crate::client::ProtocolClient;

/// De-duplicated readers of any of `event_ids`, in first-seen order.
pub fn readers_of<'a>(
    client: &dyn ProtocolClient,
    room_id: &RoomId,
    event_ids: impl IntoIterator<Item = &'a EventId>,
) -> IndexSet<UserId> {
    event_ids
        .into_iter()
        .flat_map(|event_id| client.users_read_up_to(room_id, event_id))
        .collect()
}

/// Readers of the last projected event plus, when it differs, the last event
/// of the live segment.
pub fn live_readers(
    client: &dyn ProtocolClient,
    room_id: &RoomId,
    last_projected: Option<&EventId>,
    last_live: Option<&EventId>,
) -> IndexSet<UserId> {
    let extra = last_live.filter(|live| Some(*live) != last_projected);
    readers_of(client, room_id, last_projected.into_iter().chain(extra))
}
