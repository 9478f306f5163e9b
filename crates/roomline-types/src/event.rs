//! Room events as the timeline engine sees them.
//!
//! A [`RoomEvent`] carries its wire form (`type` + `content`) plus an optional
//! [`ClearEvent`] once the protocol client has decrypted it. Relations stay on
//! the wire in cleartext, so edits and reactions can be indexed before (or
//! without) decryption.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EventId, RoomId, UserId};

/// Well-known event type strings.
pub mod event_types {
    pub const ROOM_CREATE: &str = "m.room.create";
    pub const ROOM_MESSAGE: &str = "m.room.message";
    pub const ROOM_ENCRYPTED: &str = "m.room.encrypted";
    pub const ROOM_MEMBER: &str = "m.room.member";
    pub const ROOM_REDACTION: &str = "m.room.redaction";
    pub const STICKER: &str = "m.sticker";
    pub const REACTION: &str = "m.reaction";
}

/// Well-known relation type strings.
pub mod rel_types {
    /// The relating event replaces (edits) its target.
    pub const REPLACE: &str = "m.replace";
    /// The relating event annotates its target (reactions).
    pub const ANNOTATION: &str = "m.annotation";
}

/// Relation metadata (`m.relates_to`) declaring that an event modifies or
/// reacts to another event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    /// Annotation key (the emoji for reactions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Relation {
    /// An `m.replace` relation targeting `target`.
    pub fn replace(target: impl Into<EventId>) -> Self {
        Self {
            rel_type: Some(rel_types::REPLACE.to_string()),
            event_id: Some(target.into()),
            key: None,
        }
    }

    /// An `m.annotation` relation targeting `target` with the given key.
    pub fn annotation(target: impl Into<EventId>, key: impl Into<String>) -> Self {
        Self {
            rel_type: Some(rel_types::ANNOTATION.to_string()),
            event_id: Some(target.into()),
            key: Some(key.into()),
        }
    }

    pub fn is_replace(&self) -> bool {
        self.rel_type.as_deref() == Some(rel_types::REPLACE)
    }
}

/// Decrypted payload of an encrypted event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClearEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub content: Value,
}

impl ClearEvent {
    pub fn new(event_type: impl Into<String>, content: Value) -> Self {
        Self { event_type: event_type.into(), content }
    }
}

/// A single event in a room timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub event_id: EventId,
    pub room_id: RoomId,
    pub sender: UserId,
    /// Wire type (`m.room.encrypted` for encrypted events).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Wire content.
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    #[serde(default)]
    pub redacted: bool,
    #[serde(default)]
    pub origin_server_ts: u64,
    /// Decrypted payload, present once decryption succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<ClearEvent>,
}

impl RoomEvent {
    /// A plaintext event with empty content.
    pub fn new(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            room_id: room_id.into(),
            sender: sender.into(),
            event_type: event_type.into(),
            content: Value::Null,
            relation: None,
            redacted: false,
            origin_server_ts: 0,
            clear: None,
        }
    }

    /// A plain `m.room.message` text event.
    pub fn text(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
        body: &str,
    ) -> Self {
        Self::new(event_id, room_id, sender, event_types::ROOM_MESSAGE)
            .with_content(serde_json::json!({ "msgtype": "m.text", "body": body }))
    }

    /// An `m.reaction` annotating `target` with `key`.
    pub fn reaction(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
        target: impl Into<EventId>,
        key: &str,
    ) -> Self {
        Self::new(event_id, room_id, sender, event_types::REACTION)
            .with_relation(Relation::annotation(target, key))
    }

    /// An `m.room.message` that replaces `target` with `body`.
    pub fn edit(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
        target: impl Into<EventId>,
        body: &str,
    ) -> Self {
        Self::text(event_id, room_id, sender, body).with_relation(Relation::replace(target))
    }

    /// An `m.room.encrypted` event awaiting decryption.
    pub fn encrypted(
        event_id: impl Into<EventId>,
        room_id: impl Into<RoomId>,
        sender: impl Into<UserId>,
    ) -> Self {
        Self::new(event_id, room_id, sender, event_types::ROOM_ENCRYPTED)
            .with_content(serde_json::json!({ "algorithm": "m.megolm.v1.aes-sha2" }))
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.origin_server_ts = ts;
        self
    }

    pub fn with_clear(mut self, clear: ClearEvent) -> Self {
        self.clear = Some(clear);
        self
    }

    /// Effective type: the decrypted type when available, else the wire type.
    pub fn event_type(&self) -> &str {
        match &self.clear {
            Some(clear) => &clear.event_type,
            None => &self.event_type,
        }
    }

    /// Effective content: decrypted content when available, else wire content.
    pub fn content(&self) -> &Value {
        match &self.clear {
            Some(clear) => &clear.content,
            None => &self.content,
        }
    }

    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    /// Target of this event's relation, if it declares one.
    pub fn relates_to(&self) -> Option<&EventId> {
        self.relation.as_ref().and_then(|r| r.event_id.as_ref())
    }

    /// Whether the event was sent encrypted (true before and after decryption).
    pub fn is_encrypted(&self) -> bool {
        self.event_type == event_types::ROOM_ENCRYPTED
    }

    pub fn is_decrypted(&self) -> bool {
        self.clear.is_some()
    }

    /// Encrypted and not yet holding cleared content.
    pub fn needs_decryption(&self) -> bool {
        self.is_encrypted() && !self.is_decrypted()
    }

    pub fn is_redacted(&self) -> bool {
        self.redacted
    }

    /// Attach decrypted content.
    pub fn set_clear(&mut self, clear: ClearEvent) {
        self.clear = Some(clear);
    }

    /// Strip content and mark redacted.
    pub fn redact(&mut self) {
        self.redacted = true;
        self.content = Value::Null;
        self.clear = None;
        self.relation = None;
    }
}
