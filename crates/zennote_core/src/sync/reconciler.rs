//! Caller-visible collection and idempotent merge of mutation results.

use crate::model::folder::Folder;
use crate::model::note::Note;
use crate::model::snapshot::Snapshot;
use crate::service::mutation_service::Change;
use std::collections::HashSet;

/// Holds the visible snapshot and folds authoritative changes into it.
///
/// Applying the same change twice leaves the state as applying it once:
/// upserts replace by id, removals of absent ids are ignored.
#[derive(Debug, Default)]
pub struct Reconciler {
    snapshot: Snapshot,
}

impl Reconciler {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Swaps in a freshly loaded collection.
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    /// Applies one change. Returns whether visible state changed.
    pub fn apply(&mut self, change: &Change) -> bool {
        match change {
            Change::FolderUpserted(folder) => {
                if self
                    .snapshot
                    .folder(folder.id)
                    .is_some_and(|current| same_folder(current, folder))
                {
                    return false;
                }
                self.snapshot.upsert_folder(folder.clone());
                true
            }
            Change::NoteUpserted(note) => {
                if self
                    .snapshot
                    .note(note.id)
                    .is_some_and(|current| same_note(current, note))
                {
                    return false;
                }
                self.snapshot.upsert_note(note.clone());
                true
            }
            Change::NoteRemoved(id) => self.snapshot.remove_note(*id),
            Change::FolderTreeRemoved {
                folder_ids,
                note_ids,
            } => {
                let folder_ids: HashSet<_> = folder_ids.iter().collect();
                let note_ids: HashSet<_> = note_ids.iter().collect();
                let before = (self.snapshot.folders.len(), self.snapshot.notes.len());
                self.snapshot
                    .folders
                    .retain(|folder| !folder_ids.contains(&folder.id));
                self.snapshot.notes.retain(|note| {
                    !note_ids.contains(&note.id)
                        && note
                            .folder_id
                            .map_or(true, |folder_id| !folder_ids.contains(&folder_id))
                });
                before != (self.snapshot.folders.len(), self.snapshot.notes.len())
            }
            Change::Unchanged => false,
        }
    }

    /// Applies changes in order. Returns whether any of them changed state.
    pub fn apply_all(&mut self, changes: &[Change]) -> bool {
        changes
            .iter()
            .fold(false, |changed, change| self.apply(change) || changed)
    }
}

// Entity equality is by id; merges need the full field comparison.
fn same_folder(left: &Folder, right: &Folder) -> bool {
    left.name == right.name && left.parent_id == right.parent_id && left.is_open == right.is_open
}

fn same_note(left: &Note, right: &Note) -> bool {
    left.title == right.title
        && left.content == right.content
        && left.folder_id == right.folder_id
        && left.updated_at == right.updated_at
}

#[cfg(test)]
mod tests {
    use super::Reconciler;
    use crate::model::folder::Folder;
    use crate::model::note::Note;
    use crate::model::snapshot::Snapshot;
    use crate::service::mutation_service::Change;

    #[test]
    fn duplicate_create_result_is_merged_once() {
        let mut reconciler = Reconciler::default();
        let folder = Folder::new("Work", None);
        let change = Change::FolderUpserted(folder.clone());

        assert!(reconciler.apply(&change));
        assert!(!reconciler.apply(&change));
        assert_eq!(reconciler.snapshot().folders.len(), 1);
    }

    #[test]
    fn later_update_replaces_in_place() {
        let note = Note::new("Draft", None, 1);
        let other = Note::new("Other", None, 1);
        let mut reconciler = Reconciler::new(Snapshot::new(Vec::new(), vec![note.clone(), other]));

        let edited = note.with_content("<p>x</p>", 2);
        assert!(reconciler.apply(&Change::NoteUpserted(edited)));
        assert_eq!(reconciler.snapshot().notes[0].content, "<p>x</p>");
        assert_eq!(reconciler.snapshot().notes.len(), 2);
    }

    #[test]
    fn removals_are_idempotent() {
        let a = Folder::new("A", None);
        let b = Folder::new("B", Some(a.id));
        let keep = Folder::new("Keep", None);
        let inner = Note::new("n1", Some(b.id), 0);
        let loose = Note::new("loose", None, 0);
        let mut reconciler = Reconciler::new(Snapshot::new(
            vec![a.clone(), b.clone(), keep.clone()],
            vec![inner.clone(), loose.clone()],
        ));

        let cascade = Change::FolderTreeRemoved {
            folder_ids: vec![a.id, b.id],
            note_ids: vec![inner.id],
        };
        assert!(reconciler.apply(&cascade));
        assert!(!reconciler.apply(&cascade));
        assert_eq!(reconciler.snapshot().folders, vec![keep]);
        assert_eq!(reconciler.snapshot().notes, vec![loose.clone()]);

        assert!(reconciler.apply(&Change::NoteRemoved(loose.id)));
        assert!(!reconciler.apply(&Change::NoteRemoved(loose.id)));
        assert!(!reconciler.apply(&Change::Unchanged));
    }
}
