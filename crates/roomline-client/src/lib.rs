//! Room timeline projection and consistency engine.
//!
//! Keeps a consistent, incrementally updated local view of one room's event
//! history on top of a [`ProtocolClient`] that owns sync, decryption and raw
//! storage.
//!
//! ```text
//!   ProtocolClient ──segments──▶ navigator ──▶ classify ──▶ projection
//!        │                                                      ▲
//!        └──ClientEvent push──▶ live reconciler ────────────────┘
//!                                     │
//!                RoomTimeline ◀───────┴──▶ TimelineNotification
//! ```
//!
//! # Key Types
//!
//! - [`RoomTimeline`]: the engine for one room
//! - [`ProtocolClient`]: what it needs from the outside world
//! - [`MemoryClient`]: an in-process client for tests and replays
//! - [`TimelineConfig`]: page size, allow-list, live ordering mode

pub mod classify;
pub mod client;
pub mod config;
pub mod constants;
pub mod decrypt;
pub mod error;
pub mod live;
pub mod memory;
pub mod navigator;
pub mod pagination;
pub mod projection;
pub mod read_state;
pub mod subscriptions;
pub mod timeline;

pub use classify::{EventClass, IgnoreReason, classify};
pub use client::{ClientResult, ProtocolClient};
pub use config::TimelineConfig;
pub use decrypt::{DecryptionSummary, decrypt_chain};
pub use error::{ClientError, ConfigError};
pub use live::{DecryptionTracker, ReorderBuffer};
pub use memory::{EventContext, MemoryClient, RemotePage};
pub use navigator::{Direction, Segment, SegmentArena, SegmentId, SharedSegments};
pub use pagination::PaginationState;
pub use projection::Projection;
pub use subscriptions::{ClientEvent, ListenerHandle, TimelineNotification, TypingUpdate};
pub use timeline::RoomTimeline;
