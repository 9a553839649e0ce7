//! Transient parent/child index built from one snapshot.

use crate::model::folder::Folder;
use crate::model::id::{FolderId, NoteId};
use crate::model::note::Note;
use crate::model::snapshot::Snapshot;
use std::collections::{HashMap, HashSet};

/// Borrowing hierarchy view over a [`Snapshot`].
///
/// Child listings follow collection insertion order. Building is `O(n)`;
/// rebuild after every visible-state change instead of patching.
pub struct HierarchyIndex<'a> {
    snapshot: &'a Snapshot,
    folder_positions: HashMap<FolderId, usize>,
    child_folders: HashMap<Option<FolderId>, Vec<usize>>,
    child_notes: HashMap<Option<FolderId>, Vec<usize>>,
}

impl<'a> HierarchyIndex<'a> {
    pub fn build(snapshot: &'a Snapshot) -> Self {
        let mut folder_positions = HashMap::with_capacity(snapshot.folders.len());
        for (position, folder) in snapshot.folders.iter().enumerate() {
            folder_positions.entry(folder.id).or_insert(position);
        }

        let mut child_folders: HashMap<Option<FolderId>, Vec<usize>> = HashMap::new();
        for (position, folder) in snapshot.folders.iter().enumerate() {
            if folder_positions.get(&folder.id) != Some(&position) {
                continue;
            }
            let parent = folder
                .parent_id
                .filter(|parent| *parent != folder.id && folder_positions.contains_key(parent));
            child_folders.entry(parent).or_default().push(position);
        }

        let mut child_notes: HashMap<Option<FolderId>, Vec<usize>> = HashMap::new();
        let mut seen_notes = HashSet::with_capacity(snapshot.notes.len());
        for (position, note) in snapshot.notes.iter().enumerate() {
            if !seen_notes.insert(note.id) {
                continue;
            }
            let folder = note
                .folder_id
                .filter(|folder| folder_positions.contains_key(folder));
            child_notes.entry(folder).or_default().push(position);
        }

        Self {
            snapshot,
            folder_positions,
            child_folders,
            child_notes,
        }
    }

    pub fn folder(&self, id: FolderId) -> Option<&'a Folder> {
        let snapshot = self.snapshot;
        self.folder_positions
            .get(&id)
            .map(|position| &snapshot.folders[*position])
    }

    pub fn contains_folder(&self, id: FolderId) -> bool {
        self.folder_positions.contains_key(&id)
    }

    /// Parent as the index sees it: dangling or self references read as root.
    pub fn effective_parent(&self, id: FolderId) -> Option<FolderId> {
        self.folder(id)?
            .parent_id
            .filter(|parent| *parent != id && self.contains_folder(*parent))
    }

    /// Direct child folders of `parent` (`None` = root level).
    pub fn child_folders(&self, parent: Option<FolderId>) -> Vec<&'a Folder> {
        let snapshot = self.snapshot;
        self.child_folders
            .get(&parent)
            .map(|positions| {
                positions
                    .iter()
                    .map(|position| &snapshot.folders[*position])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Notes filed directly under `folder` (`None` = unfiled).
    pub fn child_notes(&self, folder: Option<FolderId>) -> Vec<&'a Note> {
        let snapshot = self.snapshot;
        self.child_notes
            .get(&folder)
            .map(|positions| {
                positions
                    .iter()
                    .map(|position| &snapshot.notes[*position])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Transitive child folders of `root`, excluding `root` itself.
    ///
    /// A visited set stops the walk if the parent graph loops back.
    pub fn descendant_folder_ids(&self, root: FolderId) -> HashSet<FolderId> {
        let mut visited = HashSet::from([root]);
        let mut descendants = HashSet::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            for child in self.child_folders(Some(current)) {
                if visited.insert(child.id) {
                    descendants.insert(child.id);
                    stack.push(child.id);
                }
            }
        }
        descendants
    }

    /// `root` plus all of its descendants, or empty when `root` is unknown.
    pub fn subtree_folder_ids(&self, root: FolderId) -> HashSet<FolderId> {
        if !self.contains_folder(root) {
            return HashSet::new();
        }
        let mut subtree = self.descendant_folder_ids(root);
        subtree.insert(root);
        subtree
    }

    /// Notes whose folder is a member of `folders`, in collection order.
    pub fn note_ids_in(&self, folders: &HashSet<FolderId>) -> Vec<NoteId> {
        self.snapshot
            .notes
            .iter()
            .filter(|note| {
                note.folder_id
                    .is_some_and(|folder_id| folders.contains(&folder_id))
            })
            .map(|note| note.id)
            .collect()
    }

    /// Whether `ancestor` lies strictly above `descendant`.
    pub fn is_ancestor(&self, ancestor: FolderId, descendant: FolderId) -> bool {
        let mut visited = HashSet::from([descendant]);
        let mut cursor = self.effective_parent(descendant);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            cursor = self.effective_parent(current);
        }
        false
    }

    /// Folders from the root down to `id` inclusive; empty when unknown.
    pub fn folder_path(&self, id: FolderId) -> Vec<&'a Folder> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            let Some(folder) = self.folder(current) else {
                break;
            };
            path.push(folder);
            cursor = self.effective_parent(current);
        }
        path.reverse();
        path
    }
}
