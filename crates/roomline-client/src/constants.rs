//! Timeline engine constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.
//! Every value here is the default for a field of
//! [`TimelineConfig`](crate::TimelineConfig).

use roomline_types::event_types;

/// Events requested per pagination call when the caller gives no limit.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Capacity of the notification broadcast channel. Slow observers that fall
/// further behind than this see `RecvError::Lagged` and should re-query.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Event types that may enter the main sequence.
pub const DEFAULT_SUPPORTED_EVENT_TYPES: &[&str] = &[
    event_types::ROOM_CREATE,
    event_types::ROOM_MESSAGE,
    event_types::ROOM_ENCRYPTED,
    event_types::ROOM_MEMBER,
    event_types::STICKER,
];
