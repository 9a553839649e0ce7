//! Load-time normalisation of a possibly inconsistent collection.
//!
//! Rules, applied in order:
//! 1. Duplicate ids keep their first occurrence.
//! 2. Blank names/titles take the default label.
//! 3. Parents/folders that do not resolve become `None`.
//! 4. Each parent cycle is broken at the first member reached while walking
//!    folders in collection order; that member becomes a root.

use crate::model::folder::DEFAULT_FOLDER_NAME;
use crate::model::id::{FolderId, NoteId};
use crate::model::normalize_display_name;
use crate::model::note::DEFAULT_NOTE_TITLE;
use crate::model::snapshot::Snapshot;
use std::collections::{HashMap, HashSet};

/// Counts of each correction applied by [`repair`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub duplicate_folders: usize,
    pub duplicate_notes: usize,
    pub blank_names: usize,
    pub orphaned_folders: usize,
    pub broken_cycles: usize,
    pub unfiled_notes: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Returns a snapshot that satisfies the hierarchy invariants.
///
/// A snapshot that already satisfies them comes back unchanged with a clean
/// report. Relative order of surviving entities is preserved.
pub fn repair(snapshot: Snapshot) -> (Snapshot, RepairReport) {
    let mut report = RepairReport::default();
    let Snapshot { folders, notes } = snapshot;

    let total_folders = folders.len();
    let mut seen_folders = HashSet::with_capacity(total_folders);
    let mut folders: Vec<_> = folders
        .into_iter()
        .filter(|folder| seen_folders.insert(folder.id))
        .collect();
    report.duplicate_folders = total_folders - folders.len();

    let mut seen_notes: HashSet<NoteId> = HashSet::with_capacity(notes.len());
    let total_notes = notes.len();
    let mut notes: Vec<_> = notes
        .into_iter()
        .filter(|note| seen_notes.insert(note.id))
        .collect();
    report.duplicate_notes = total_notes - notes.len();

    for folder in &mut folders {
        if normalize_display_name(&folder.name).is_none() {
            folder.name = DEFAULT_FOLDER_NAME.to_string();
            report.blank_names += 1;
        }
    }
    for note in &mut notes {
        if normalize_display_name(&note.title).is_none() {
            note.title = DEFAULT_NOTE_TITLE.to_string();
            report.blank_names += 1;
        }
    }

    for folder in &mut folders {
        if let Some(parent) = folder.parent_id {
            if parent == folder.id || !seen_folders.contains(&parent) {
                folder.parent_id = None;
                report.orphaned_folders += 1;
            }
        }
    }

    let mut parents: HashMap<FolderId, Option<FolderId>> = folders
        .iter()
        .map(|folder| (folder.id, folder.parent_id))
        .collect();
    let mut reaches_root: HashSet<FolderId> = HashSet::with_capacity(folders.len());
    for folder in &folders {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut cursor = Some(folder.id);
        while let Some(current) = cursor {
            if reaches_root.contains(&current) {
                break;
            }
            if !on_path.insert(current) {
                parents.insert(current, None);
                report.broken_cycles += 1;
                break;
            }
            path.push(current);
            cursor = parents.get(&current).copied().flatten();
        }
        reaches_root.extend(path);
    }
    for folder in &mut folders {
        folder.parent_id = parents.get(&folder.id).copied().flatten();
    }

    for note in &mut notes {
        if let Some(folder_id) = note.folder_id {
            if !seen_folders.contains(&folder_id) {
                note.folder_id = None;
                report.unfiled_notes += 1;
            }
        }
    }

    (Snapshot { folders, notes }, report)
}
