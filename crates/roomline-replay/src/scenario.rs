//! Scenario files: a seeded room plus a script of steps.
//!
//! ```ron
//! Scenario(
//!     room: "!demo:example.org",
//!     encrypted: true,
//!     live: [
//!         (id: "$3", kind: Text("hello")),
//!         (id: "$4", kind: Encrypted(plaintext: None)),
//!     ],
//!     live_back_token: Some("t1"),
//!     pages: {
//!         "t1": (events: [(id: "$1", kind: Text("first"))]),
//!     },
//!     steps: [LoadLive, Paginate(direction: backward), Dump],
//! )
//! ```

use std::collections::BTreeMap;

use roomline_client::{Direction, EventContext, MemoryClient, RemotePage, SegmentId, TimelineConfig};
use roomline_types::{ClearEvent, EventId, RoomEvent, RoomId, UserId, event_types};
use serde::Deserialize;

fn default_sender() -> UserId {
    UserId::new("@alice:example.org")
}

/// What an event is, in scenario shorthand.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub enum EventKind {
    /// `m.room.message` with a text body.
    Text(String),
    /// Undecrypted `m.room.encrypted`. Decrypts to `plaintext` when given.
    Encrypted {
        #[serde(default)]
        plaintext: Option<String>,
    },
    Reaction { target: EventId, key: String },
    Edit { target: EventId, body: String },
    /// Any other event type with empty content.
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EventSpec {
    pub id: EventId,
    #[serde(default = "default_sender")]
    pub sender: UserId,
    pub kind: EventKind,
    #[serde(default)]
    pub ts: u64,
}

impl EventSpec {
    pub fn to_event(&self, room_id: &RoomId) -> RoomEvent {
        let (id, room, sender) = (self.id.clone(), room_id.clone(), self.sender.clone());
        let event = match &self.kind {
            EventKind::Text(body) => RoomEvent::text(id, room, sender, body.as_str()),
            EventKind::Encrypted { .. } => RoomEvent::encrypted(id, room, sender),
            EventKind::Reaction { target, key } => {
                RoomEvent::reaction(id, room, sender, target.clone(), key.as_str())
            }
            EventKind::Edit { target, body } => {
                RoomEvent::edit(id, room, sender, target.clone(), body.as_str())
            }
            EventKind::Other(event_type) => RoomEvent::new(id, room, sender, event_type.as_str()),
        };
        event.with_timestamp(self.ts)
    }

    /// Cleartext an encrypted event decrypts to, if the scenario set one.
    pub fn plaintext(&self) -> Option<ClearEvent> {
        match &self.kind {
            EventKind::Encrypted { plaintext: Some(body) } => Some(ClearEvent::new(
                event_types::ROOM_MESSAGE,
                serde_json::json!({ "msgtype": "m.text", "body": body }),
            )),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PageSpec {
    pub events: Vec<EventSpec>,
    #[serde(default)]
    pub next_token: Option<String>,
    /// The page ends at the live segment.
    #[serde(default)]
    pub joins_live: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ContextSpec {
    pub events: Vec<EventSpec>,
    #[serde(default)]
    pub back_token: Option<String>,
    #[serde(default)]
    pub forward_token: Option<String>,
}

/// One scripted action.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub enum Step {
    LoadLive,
    LoadEvent(EventId),
    Paginate {
        direction: Direction,
        #[serde(default)]
        limit: Option<usize>,
    },
    PushLive(EventSpec),
    Decrypt(EventId),
    Redact(EventId),
    Typing { user: UserId, typing: bool },
    Receipt { user: UserId, event: EventId },
    MarkAsRead,
    Readers(EventId),
    Dump,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Scenario {
    pub room: RoomId,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub config: Option<TimelineConfig>,
    #[serde(default)]
    pub live: Vec<EventSpec>,
    #[serde(default)]
    pub live_back_token: Option<String>,
    #[serde(default)]
    pub pages: BTreeMap<String, PageSpec>,
    #[serde(default)]
    pub contexts: BTreeMap<EventId, ContextSpec>,
    #[serde(default)]
    pub read_markers: BTreeMap<UserId, EventId>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Every event the scenario can ever produce.
    fn all_events(&self) -> impl Iterator<Item = &EventSpec> {
        let pushed = self.steps.iter().filter_map(|step| match step {
            Step::PushLive(spec) => Some(spec),
            _ => None,
        });
        self.live
            .iter()
            .chain(self.pages.values().flat_map(|p| p.events.iter()))
            .chain(self.contexts.values().flat_map(|c| c.events.iter()))
            .chain(pushed)
    }

    /// Create the room in `client` and seed its history. Returns the live
    /// segment.
    pub fn seed(&self, client: &MemoryClient) -> SegmentId {
        let (segments, live) = client.add_room(self.room.clone(), self.encrypted);
        {
            let mut arena = segments.write();
            if let Some(segment) = arena.get_mut(live) {
                for spec in &self.live {
                    segment.push_event(spec.to_event(&self.room));
                }
                segment.set_pagination_token(Direction::Backward, self.live_back_token.clone());
            }
        }

        let to_events = |specs: &[EventSpec]| -> Vec<RoomEvent> {
            specs.iter().map(|s| s.to_event(&self.room)).collect()
        };
        for (token, page) in &self.pages {
            client.add_remote_page(&self.room, token.as_str(), RemotePage {
                events: to_events(&page.events),
                next_token: page.next_token.clone(),
                joins: page.joins_live.then_some(live),
            });
        }
        for (event_id, context) in &self.contexts {
            client.add_event_context(&self.room, event_id.clone(), EventContext {
                events: to_events(&context.events),
                back_token: context.back_token.clone(),
                forward_token: context.forward_token.clone(),
            });
        }
        for (user, event_id) in &self.read_markers {
            client.set_read_up_to(&self.room, user.clone(), event_id.clone());
        }
        for spec in self.all_events() {
            if let Some(clear) = spec.plaintext() {
                client.set_decrypted_payload(spec.id.clone(), clear);
            }
        }
        live
    }

    /// Config from the scenario file, or defaults.
    pub fn timeline_config(&self) -> TimelineConfig {
        self.config.clone().unwrap_or_default()
    }
}
