//! Shared identity, event, and receipt types for roomline.
//!
//! A pure leaf crate with no internal roomline dependencies: the vocabulary
//! the timeline engine and protocol clients agree on.
//!
//! # Key Types
//!
//! |--------------------|---------------------------------------------|
//! | Type               | Purpose                                     |
//! |--------------------|---------------------------------------------|
//! | [`RoomId`]         | Which room                                  |
//! | [`EventId`]        | Which event                                 |
//! | [`UserId`]         | Who (sender, reader, typist)                |
//! | [`RoomEvent`]      | One timeline event (wire + decrypted form)  |
//! | [`Relation`]       | Edit / reaction link to another event       |
//! | [`ReceiptContent`] | Receipt push payload                        |
//! |--------------------|---------------------------------------------|

pub mod event;
pub mod ids;
pub mod receipt;

pub use event::{ClearEvent, Relation, RoomEvent, event_types, rel_types};
pub use ids::{EventId, RoomId, UserId};
pub use receipt::{Receipt, ReceiptContent, ReceiptType, ReceiptsByUser};
