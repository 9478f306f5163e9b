//! Typed identifiers for rooms, events, and users.
//!
//! Protocol identifiers are opaque strings with a leading sigil
//! (`!room:server`, `$event`, `@user:server`). They're kept as strings on the
//! wire and in logs; the newtypes only stop a room id from being passed where
//! an event id is expected. The `short()` form is for human-facing output;
//! never used as a lookup key.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A room identifier (`!opaque:server`).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

/// An event identifier (`$opaque`).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

/// A user identifier (`@localpart:server`).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal, $sigil:literal) => {
        impl $T {
            /// The sigil a well-formed id starts with.
            pub const SIGIL: char = $sigil;

            /// Wrap a raw identifier string. No validation is performed.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// Whether the id starts with the expected sigil.
            pub fn has_sigil(&self) -> bool {
                self.0.starts_with(Self::SIGIL)
            }

            /// Up to 8 characters after the sigil, for human display only.
            pub fn short(&self) -> String {
                self.0
                    .trim_start_matches(Self::SIGIL)
                    .chars()
                    .take(8)
                    .collect()
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $T {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $T {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $T {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_typed_id!(RoomId, "RoomId", '!');
impl_typed_id!(EventId, "EventId", '$');
impl_typed_id!(UserId, "UserId", '@');

// ============================================================================
// Tests
// ============================================================================
