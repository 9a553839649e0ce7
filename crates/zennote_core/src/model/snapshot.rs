//! Whole-collection snapshot exchanged with persistence gateways.
//!
//! # Invariants
//! - Collection order is insertion order; it is what child listings follow.
//! - Serialized shape is `{ "folders": [...], "notes": [...] }`.

use crate::model::folder::Folder;
use crate::model::id::{FolderId, NoteId};
use crate::model::note::Note;
use serde::{Deserialize, Serialize};

/// Flat folder + note collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Snapshot {
    pub fn new(folders: Vec<Folder>, notes: Vec<Note>) -> Self {
        Self { folders, notes }
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.notes.is_empty()
    }

    pub fn folder(&self, id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|folder| folder.id == id)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn contains_folder(&self, id: FolderId) -> bool {
        self.folder(id).is_some()
    }

    pub fn contains_note(&self, id: NoteId) -> bool {
        self.note(id).is_some()
    }

    /// Replaces the folder with the same id, or appends it.
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert_folder(&mut self, folder: Folder) -> bool {
        match self.folders.iter_mut().find(|current| current.id == folder.id) {
            Some(current) => {
                *current = folder;
                true
            }
            None => {
                self.folders.push(folder);
                false
            }
        }
    }

    /// Replaces the note with the same id, or appends it.
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert_note(&mut self, note: Note) -> bool {
        match self.notes.iter_mut().find(|current| current.id == note.id) {
            Some(current) => {
                *current = note;
                true
            }
            None => {
                self.notes.push(note);
                false
            }
        }
    }

    /// Removes one note. Returns `true` when it was present.
    pub fn remove_note(&mut self, id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        self.notes.len() != before
    }
}
