//! Typed identifiers for folders and notes.
//!
//! # Responsibility
//! - Mint collision-resistant ids for new entities.
//! - Parse and validate textual ids coming from storage or drag payloads.
//!
//! # Invariants
//! - Folder ids render as `f-<uuid>`, note ids as `n-<uuid>`.
//! - A string carrying one kind's prefix never parses as the other kind.
//! - Fresh ids are random v4 UUIDs, so two creates in the same tick cannot
//!   collide.
//! - Legacy ids (`f-1700000000000`) parse to a name-based v5 UUID derived
//!   from the full text, so the same string always yields the same id and
//!   references between imported entities stay intact.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a textual id is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    /// Value is empty after trimming.
    Empty,
    /// Value does not start with the expected type prefix.
    WrongPrefix {
        expected: &'static str,
        value: String,
    },
    /// Prefix matched but the remainder is empty or carries characters a
    /// legacy id never contains.
    Malformed(String),
}

impl Display for IdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "id must not be empty"),
            Self::WrongPrefix { expected, value } => {
                write!(f, "id `{value}` does not start with `{expected}`")
            }
            Self::Malformed(value) => write!(f, "id `{value}` is malformed"),
        }
    }
}

impl Error for IdParseError {}

// Namespace for v5 ids derived from legacy textual ids.
const LEGACY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5a3e_6e07_9c1d_4f0b_8a52_d3c4_71e2_b9f0);

fn is_legacy_suffix(rest: &str) -> bool {
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Type tag prepended to the textual form.
            pub const PREFIX: &'static str = $prefix;

            /// Mints a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Stable id for a legacy textual id such as `f-1700000000000`.
            fn from_legacy(value: &str) -> Self {
                Self(Uuid::new_v5(&LEGACY_ID_NAMESPACE, value.as_bytes()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                if value.is_empty() {
                    return Err(IdParseError::Empty);
                }
                let rest = value
                    .strip_prefix(Self::PREFIX)
                    .ok_or_else(|| IdParseError::WrongPrefix {
                        expected: Self::PREFIX,
                        value: value.to_string(),
                    })?;
                if let Ok(uuid) = Uuid::parse_str(rest) {
                    return Ok(Self(uuid));
                }
                if !is_legacy_suffix(rest) {
                    return Err(IdParseError::Malformed(value.to_string()));
                }
                Ok(Self::from_legacy(value))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

entity_id!(
    /// Stable folder identifier (`f-<uuid>`).
    FolderId,
    "f-"
);

entity_id!(
    /// Stable note identifier (`n-<uuid>`).
    NoteId,
    "n-"
);

impl NoteId {
    /// Validates a drag-and-drop payload as a note id.
    ///
    /// Drop targets receive untyped text; anything that is not shaped like a
    /// note id (including folder ids) is rejected instead of being passed on.
    pub fn from_transfer(payload: &str) -> Result<Self, IdParseError> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Err(IdParseError::Empty);
        }
        trimmed.parse()
    }
}
