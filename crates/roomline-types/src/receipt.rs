//! Read-receipt content as delivered by receipt push events.
//!
//! The wire layout is `event_id → receipt_type → user_id → receipt`. Only the
//! shape matters here; interpretation (who has read what) stays with the
//! protocol client.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{EventId, UserId};

/// Receipt kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString)]
pub enum ReceiptType {
    /// Public read receipt.
    #[serde(rename = "m.read")]
    #[strum(serialize = "m.read")]
    Read,
    /// Private read receipt (not shared with other members).
    #[serde(rename = "m.read.private")]
    #[strum(serialize = "m.read.private")]
    ReadPrivate,
    /// Any receipt type this crate does not model.
    #[serde(other)]
    #[strum(disabled)]
    Other,
}

impl ReceiptType {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        <Self as FromStr>::from_str(s).unwrap_or(ReceiptType::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptType::Read => "m.read",
            ReceiptType::ReadPrivate => "m.read.private",
            ReceiptType::Other => "other",
        }
    }
}

impl std::fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single user's receipt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
}

/// Receipts of one type, keyed by user.
pub type ReceiptsByUser = BTreeMap<UserId, Receipt>;

/// Content of a receipt push event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptContent(BTreeMap<EventId, BTreeMap<ReceiptType, ReceiptsByUser>>);

impl ReceiptContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one receipt.
    pub fn with_receipt(
        mut self,
        event_id: impl Into<EventId>,
        receipt_type: ReceiptType,
        user_id: impl Into<UserId>,
        ts: Option<u64>,
    ) -> Self {
        self.insert(event_id.into(), receipt_type, user_id.into(), Receipt { ts });
        self
    }

    pub fn insert(&mut self, event_id: EventId, receipt_type: ReceiptType, user_id: UserId, receipt: Receipt) {
        self.0
            .entry(event_id)
            .or_default()
            .entry(receipt_type)
            .or_default()
            .insert(user_id, receipt);
    }

    /// All receipts attached to `event_id`.
    pub fn for_event(&self, event_id: &EventId) -> Option<&BTreeMap<ReceiptType, ReceiptsByUser>> {
        self.0.get(event_id)
    }

    /// Whether `event_id` carries an `m.read` entry, even an empty one.
    pub fn has_read_receipt(&self, event_id: &EventId) -> bool {
        self.for_event(event_id)
            .and_then(|by_type| by_type.get(&ReceiptType::Read))
            .is_some()
    }

    pub fn event_ids(&self) -> impl Iterator<Item = &EventId> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
