//! Note domain model.
//!
//! # Responsibility
//! - Define the document record stored in the workspace hierarchy.
//! - Produce new note versions for rename/edit/move operations.
//!
//! # Invariants
//! - `content` is an opaque serialized blob; the store never parses it.
//! - `updated_at` never decreases across successive versions of one note.
//! - `folder_id = None` means the note is unfiled.

use crate::model::id::{FolderId, NoteId};
use crate::model::normalize_display_name;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Title given to notes created without a usable title.
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Page";

/// Text/sketch document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Serialized rich content (HTML markup) owned by the editor.
    #[serde(default)]
    pub content: String,
    /// Containing folder. `None` means unfiled.
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    /// Unix epoch milliseconds of the last write.
    #[serde(default)]
    pub updated_at: i64,
}

impl Note {
    /// Creates an empty note with a freshly minted id.
    ///
    /// A blank `title` falls back to [`DEFAULT_NOTE_TITLE`].
    pub fn new(title: &str, folder_id: Option<FolderId>, now_ms: i64) -> Self {
        Self {
            id: NoteId::new(),
            title: normalize_display_name(title).unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string()),
            content: String::new(),
            folder_id,
            updated_at: now_ms,
        }
    }

    /// Returns a retitled version, or `None` when `title` is blank.
    pub fn renamed(&self, title: &str, now_ms: i64) -> Option<Self> {
        let title = normalize_display_name(title)?;
        Some(Self {
            title,
            updated_at: self.touched(now_ms),
            ..self.clone()
        })
    }

    /// Returns a version with fully replaced content.
    pub fn with_content(&self, content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            content: content.into(),
            updated_at: self.touched(now_ms),
            ..self.clone()
        }
    }

    /// Returns a version filed under `folder_id`.
    pub fn moved_to(&self, folder_id: Option<FolderId>, now_ms: i64) -> Self {
        Self {
            folder_id,
            updated_at: self.touched(now_ms),
            ..self.clone()
        }
    }

    pub fn is_unfiled(&self) -> bool {
        self.folder_id.is_none()
    }

    // Wall clocks can step backwards; the stored timestamp must not.
    fn touched(&self, now_ms: i64) -> i64 {
        self.updated_at.max(now_ms)
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Note {}

impl Hash for Note {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::{Note, DEFAULT_NOTE_TITLE};
    use crate::model::id::FolderId;

    #[test]
    fn new_note_has_empty_content_and_creation_timestamp() {
        let folder = FolderId::new();
        let note = Note::new("Draft", Some(folder), 1_000);
        assert_eq!(note.title, "Draft");
        assert!(note.content.is_empty());
        assert_eq!(note.folder_id, Some(folder));
        assert_eq!(note.updated_at, 1_000);
    }

    #[test]
    fn blank_title_uses_default() {
        assert_eq!(Note::new("", None, 0).title, DEFAULT_NOTE_TITLE);
    }

    #[test]
    fn updated_at_never_goes_backwards() {
        let note = Note::new("x", None, 5_000);
        let edited = note.with_content("<p>hi</p>", 4_000);
        assert_eq!(edited.updated_at, 5_000);
        let moved = edited.moved_to(None, 6_000);
        assert_eq!(moved.updated_at, 6_000);
        let renamed = moved.renamed("y", 1).unwrap();
        assert_eq!(renamed.updated_at, 6_000);
    }

    #[test]
    fn versions_do_not_mutate_original() {
        let note = Note::new("x", None, 0);
        let _ = note.with_content("changed", 10);
        assert!(note.content.is_empty());
        assert!(note.renamed(" ", 10).is_none());
    }
}
