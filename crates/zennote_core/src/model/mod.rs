//! Domain model for the folder/note document store.
//!
//! # Responsibility
//! - Define the folder and note records shared by every layer.
//! - Mint and validate typed identifiers.
//! - Provide the snapshot shape exchanged with persistence gateways.
//!
//! # Invariants
//! - Entities are value records: edits produce a new version, never mutate
//!   a shared one in place.
//! - Entity equality is identity equality (`id`), not field equality.
//! - Persisted names/titles are trimmed and never blank.

pub mod folder;
pub mod id;
pub mod note;
pub mod snapshot;

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns current wall-clock time as Unix epoch milliseconds.
///
/// Falls back to `0` when the system clock reports a pre-epoch time; callers
/// that need monotonic values combine this with the previous timestamp.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Trims a user-facing label and rejects blank input.
///
/// Returns `None` for empty or whitespace-only values.
pub fn normalize_display_name(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_display_name, now_epoch_ms};

    #[test]
    fn normalize_display_name_trims_and_rejects_blank() {
        assert_eq!(normalize_display_name("  Work "), Some("Work".to_string()));
        assert_eq!(normalize_display_name(""), None);
        assert_eq!(normalize_display_name(" \t\n"), None);
    }

    #[test]
    fn now_epoch_ms_is_after_2020() {
        assert!(now_epoch_ms() > 1_577_836_800_000);
    }
}
