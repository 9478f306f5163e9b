//! Error types for collaborator calls and configuration.
//!
//! Nothing in the timeline engine is fatal: collaborator failures are logged
//! and degrade to a `false` result or an optimistic flag. These types exist so
//! protocol clients can say *why* a call failed.

use std::path::PathBuf;

use roomline_types::{EventId, RoomId};
use thiserror::Error;

use crate::navigator::SegmentId;

/// Errors reported by a [`ProtocolClient`](crate::ProtocolClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Transport-level failure (timeout, connection reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The room is not known to the client.
    #[error("unknown room: {0}")]
    UnknownRoom(RoomId),

    /// The segment handle does not exist in the room's arena.
    #[error("unknown segment: {0:?}")]
    UnknownSegment(SegmentId),

    /// The event could not be located locally or on the server.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Decryption of a single event failed.
    #[error("failed to decrypt {event_id}: {reason}")]
    Decryption { event_id: EventId, reason: String },
}

/// Errors loading a [`TimelineConfig`](crate::TimelineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("invalid config: {0}")]
    Invalid(String),
}
