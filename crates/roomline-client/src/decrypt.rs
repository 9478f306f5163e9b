//! Decrypt-before-merge: settle decryption of a whole chain before the
//! projection is rebuilt from it.

use futures::future::join_all;
use roomline_types::{EventId, RoomId};
use tracing::{debug, warn};

use crate::client::ProtocolClient;
use crate::navigator::{Direction, SegmentId, SharedSegments};

/// Outcome of [`decrypt_chain`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecryptionSummary {
    pub attempted: usize,
    pub failed: usize,
}

impl DecryptionSummary {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }
}

/// Ids needing decryption in each segment of the chain holding `active`,
/// newest first within a segment.
fn undecrypted_ids(segments: &SharedSegments, active: SegmentId) -> Vec<Vec<EventId>> {
    let arena = segments.read();
    let head = arena.head(active);
    let mut batches = Vec::new();
    arena.for_each_in_chain(head, Direction::Forward, |_, segment| {
        let ids: Vec<EventId> = segment
            .events()
            .iter()
            .rev()
            .filter(|e| e.needs_decryption())
            .map(|e| e.event_id.clone())
            .collect();
        if !ids.is_empty() {
            batches.push(ids);
        }
    });
    batches
}

/// Request decryption of every undecrypted event in the active chain and
/// wait for all attempts to settle.
///
/// Failures are logged per event and never abort the batch; a failed event
/// stays in the chain as an undecryptable placeholder.
pub async fn decrypt_chain(
    client: &dyn ProtocolClient,
    room_id: &RoomId,
    segments: &SharedSegments,
    active: SegmentId,
) -> DecryptionSummary {
    let mut summary = DecryptionSummary::default();

    for batch in undecrypted_ids(segments, active) {
        let attempts = batch.iter().map(|event_id| async move {
            (event_id, client.decrypt_event(room_id, event_id).await)
        });
        for (event_id, result) in join_all(attempts).await {
            summary.attempted += 1;
            if let Err(e) = result {
                summary.failed += 1;
                warn!(room = %room_id, event = %event_id, "decryption failed: {e}");
            }
        }
    }

    if summary.attempted > 0 {
        debug!(room = %room_id, attempted = summary.attempted, failed = summary.failed, "chain decrypted");
    }
    summary
}
