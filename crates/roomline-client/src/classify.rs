//! Event classification: which projection container an event belongs in.

use roomline_types::{EventId, RoomEvent, event_types};

/// Where an event goes in the projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    /// Appended to the main sequence.
    Main,
    /// Indexed as an edit of the target event.
    Edit(EventId),
    /// Indexed as a reaction to the target event.
    Reaction(EventId),
    /// Never enters any container.
    Ignored(IgnoreReason),
}

/// Why an event was left out of the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Redacted,
    /// Effective type is not in the supported allow-list.
    Unsupported,
    /// An edit or reaction without a relation target.
    MissingRelationTarget,
}

impl EventClass {
    pub fn is_main(&self) -> bool {
        matches!(self, EventClass::Main)
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, EventClass::Ignored(_))
    }
}

/// Classify `event` against the supported-type allow-list.
///
/// Order matters: redaction is checked first, and reactions are routed before
/// the allow-list so they can never land in the main sequence.
pub fn classify(event: &RoomEvent, supported_types: &[String]) -> EventClass {
    if event.is_redacted() {
        return EventClass::Ignored(IgnoreReason::Redacted);
    }

    if event.event_type() == event_types::REACTION {
        return match event.relates_to() {
            Some(target) => EventClass::Reaction(target.clone()),
            None => EventClass::Ignored(IgnoreReason::MissingRelationTarget),
        };
    }

    if !supported_types.iter().any(|t| t == event.event_type()) {
        return EventClass::Ignored(IgnoreReason::Unsupported);
    }

    match event.relation() {
        Some(relation) if relation.is_replace() => match &relation.event_id {
            Some(target) => EventClass::Edit(target.clone()),
            None => EventClass::Ignored(IgnoreReason::MissingRelationTarget),
        },
        _ => EventClass::Main,
    }
}
