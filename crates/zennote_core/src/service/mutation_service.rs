//! Folder/note mutation use-case service.
//!
//! # Responsibility
//! - Validate references against the current hierarchy before any write.
//! - Apply create, rename, toggle, move, update and delete edits and write
//!   the resulting collection through the snapshot gateway.
//! - Report each authoritative result as a [`Change`] for reconciliation.
//!
//! # Invariants
//! - Reference failures are rejected before the gateway is touched.
//! - Blank renames are no-ops, never errors.
//! - Folder delete removes the whole subtree and its notes in one save.
//! - Auto-opening a parent is a second save issued only after the primary
//!   save succeeded; its failure never fails the operation.
//! - Load/validate/save cycles are serialised so concurrent operations
//!   cannot drop each other's writes.

use crate::hierarchy::index::HierarchyIndex;
use crate::hierarchy::repair::{repair, RepairReport};
use crate::model::folder::Folder;
use crate::model::id::{FolderId, NoteId};
use crate::model::normalize_display_name;
use crate::model::note::Note;
use crate::model::now_epoch_ms;
use crate::model::snapshot::Snapshot;
use crate::repo::snapshot_repo::{RepoError, SnapshotRepository};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub type MutationResult<T> = Result<T, MutationError>;

/// Errors from mutation operations.
#[derive(Debug)]
pub enum MutationError {
    /// Target folder does not exist.
    FolderNotFound(FolderId),
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Referenced parent/container folder does not exist.
    ParentNotFound(FolderId),
    /// Move would place a folder under itself or one of its descendants.
    CycleDetected {
        folder_id: FolderId,
        parent_id: FolderId,
    },
    /// Gateway load or save failed; the durable copy is unchanged.
    Persistence(RepoError),
}

impl MutationError {
    /// Whether the operation targeted an id that does not resolve.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Self::FolderNotFound(_) | Self::NoteNotFound(_) | Self::ParentNotFound(_)
        )
    }

    fn code(&self) -> &'static str {
        match self {
            Self::FolderNotFound(_) | Self::NoteNotFound(_) | Self::ParentNotFound(_) => {
                "reference"
            }
            Self::CycleDetected { .. } => "cycle",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FolderNotFound(id) => write!(f, "folder not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent folder not found: {id}"),
            Self::CycleDetected {
                folder_id,
                parent_id,
            } => write!(
                f,
                "move would create cycle: folder {folder_id} under parent {parent_id}"
            ),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MutationError {
    fn from(value: RepoError) -> Self {
        Self::Persistence(value)
    }
}

/// Authoritative result of one mutation, in the shape reconciliation needs.
#[derive(Debug, Clone)]
pub enum Change {
    FolderUpserted(Folder),
    NoteUpserted(Note),
    NoteRemoved(NoteId),
    /// Cascade result. Both lists follow collection order.
    FolderTreeRemoved {
        folder_ids: Vec<FolderId>,
        note_ids: Vec<NoteId>,
    },
    /// Validation no-op; nothing was written.
    Unchanged,
}

impl Change {
    pub fn folder(&self) -> Option<&Folder> {
        match self {
            Self::FolderUpserted(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn note(&self) -> Option<&Note> {
        match self {
            Self::NoteUpserted(note) => Some(note),
            _ => None,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Result of create/move operations that may reveal a closed parent.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub change: Change,
    /// Parent folder forced open by the operation, if any.
    pub revealed: Option<Folder>,
}

impl MutationOutcome {
    fn new(change: Change, revealed: Option<Folder>) -> Self {
        Self { change, revealed }
    }

    /// Primary change followed by the reveal change, if any.
    pub fn changes(&self) -> Vec<Change> {
        let mut changes = vec![self.change.clone()];
        if let Some(folder) = &self.revealed {
            changes.push(Change::FolderUpserted(folder.clone()));
        }
        changes
    }
}

/// Bundled title/content edit written by autosave.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteDraft {
    /// Blank keeps the stored title.
    pub title: String,
    /// Replaces the stored content verbatim.
    pub content: String,
}

/// Mutation service facade over one snapshot gateway.
pub struct MutationService<R: SnapshotRepository> {
    repo: Arc<R>,
    write_lock: Mutex<()>,
}

impl<R: SnapshotRepository> MutationService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Loads the durable collection and repairs it in memory.
    pub async fn load_snapshot(&self) -> MutationResult<Snapshot> {
        let started_at = Instant::now();
        let result = self.load_repaired().await;
        finish("snapshot_load", started_at, result)
    }

    /// Replaces the durable collection with a repaired copy of `snapshot`.
    pub async fn import_snapshot(&self, snapshot: Snapshot) -> MutationResult<RepairReport> {
        let started_at = Instant::now();
        let result: MutationResult<RepairReport> = async {
            let _guard = self.write_lock.lock().await;
            let (repaired, report) = repair(snapshot);
            self.repo.save(&repaired).await?;
            info!(
                "event=snapshot_import module=mutation folders={} notes={}",
                repaired.folders.len(),
                repaired.notes.len()
            );
            Ok(report)
        }
        .await;
        finish("snapshot_import", started_at, result)
    }

    /// Creates one open folder under an optional parent.
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<FolderId>,
    ) -> MutationResult<MutationOutcome> {
        let started_at = Instant::now();
        let result: MutationResult<MutationOutcome> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            ensure_parent(&snapshot, parent_id)?;

            let folder = Folder::new(name, parent_id);
            snapshot.folders.push(folder.clone());
            self.repo.save(&snapshot).await?;

            let revealed = self.reveal(&mut snapshot, parent_id).await;
            Ok(MutationOutcome::new(Change::FolderUpserted(folder), revealed))
        }
        .await;
        finish("folder_create", started_at, result)
    }

    /// Creates one empty note in an optional folder.
    pub async fn create_note(
        &self,
        title: &str,
        folder_id: Option<FolderId>,
    ) -> MutationResult<MutationOutcome> {
        let started_at = Instant::now();
        let result: MutationResult<MutationOutcome> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            ensure_parent(&snapshot, folder_id)?;

            let note = Note::new(title, folder_id, now_epoch_ms());
            snapshot.notes.push(note.clone());
            self.repo.save(&snapshot).await?;

            let revealed = self.reveal(&mut snapshot, folder_id).await;
            Ok(MutationOutcome::new(Change::NoteUpserted(note), revealed))
        }
        .await;
        finish("note_create", started_at, result)
    }

    /// Renames one folder. Blank or identical names are no-ops.
    pub async fn rename_folder(&self, id: FolderId, name: &str) -> MutationResult<Change> {
        let started_at = Instant::now();
        let result: MutationResult<Change> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let current = snapshot.folder(id).ok_or(MutationError::FolderNotFound(id))?;
            let Some(renamed) = current.renamed(name) else {
                return Ok(Change::Unchanged);
            };
            if renamed.name == current.name {
                return Ok(Change::Unchanged);
            }
            snapshot.upsert_folder(renamed.clone());
            self.repo.save(&snapshot).await?;
            Ok(Change::FolderUpserted(renamed))
        }
        .await;
        finish("folder_rename", started_at, result)
    }

    /// Renames one note. Blank or identical titles are no-ops.
    pub async fn rename_note(&self, id: NoteId, title: &str) -> MutationResult<Change> {
        let started_at = Instant::now();
        let result: MutationResult<Change> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let current = snapshot.note(id).ok_or(MutationError::NoteNotFound(id))?;
            let Some(renamed) = current.renamed(title, now_epoch_ms()) else {
                return Ok(Change::Unchanged);
            };
            if renamed.title == current.title {
                return Ok(Change::Unchanged);
            }
            snapshot.upsert_note(renamed.clone());
            self.repo.save(&snapshot).await?;
            Ok(Change::NoteUpserted(renamed))
        }
        .await;
        finish("note_rename", started_at, result)
    }

    /// Flips the expansion state of one folder.
    pub async fn toggle_folder(&self, id: FolderId) -> MutationResult<Change> {
        let started_at = Instant::now();
        let result: MutationResult<Change> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let current = snapshot.folder(id).ok_or(MutationError::FolderNotFound(id))?;
            let toggled = current.with_open(!current.is_open);
            snapshot.upsert_folder(toggled.clone());
            self.repo.save(&snapshot).await?;
            Ok(Change::FolderUpserted(toggled))
        }
        .await;
        finish("folder_toggle", started_at, result)
    }

    /// Files one note under `target` (`None` = unfiled).
    pub async fn move_note(
        &self,
        id: NoteId,
        target: Option<FolderId>,
    ) -> MutationResult<MutationOutcome> {
        let started_at = Instant::now();
        let result: MutationResult<MutationOutcome> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let current = snapshot.note(id).ok_or(MutationError::NoteNotFound(id))?;
            ensure_parent(&snapshot, target)?;
            if current.folder_id == target {
                let revealed = self.reveal(&mut snapshot, target).await;
                return Ok(MutationOutcome::new(Change::Unchanged, revealed));
            }

            let moved = current.moved_to(target, now_epoch_ms());
            snapshot.upsert_note(moved.clone());
            self.repo.save(&snapshot).await?;

            let revealed = self.reveal(&mut snapshot, target).await;
            Ok(MutationOutcome::new(Change::NoteUpserted(moved), revealed))
        }
        .await;
        finish("note_move", started_at, result)
    }

    /// Reparents one folder under `parent` (`None` = root).
    pub async fn move_folder(
        &self,
        id: FolderId,
        parent: Option<FolderId>,
    ) -> MutationResult<MutationOutcome> {
        let started_at = Instant::now();
        let result: MutationResult<MutationOutcome> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let current = snapshot
                .folder(id)
                .ok_or(MutationError::FolderNotFound(id))?
                .clone();
            ensure_parent(&snapshot, parent)?;
            if let Some(parent_id) = parent {
                let index = HierarchyIndex::build(&snapshot);
                if parent_id == id || index.is_ancestor(id, parent_id) {
                    return Err(MutationError::CycleDetected {
                        folder_id: id,
                        parent_id,
                    });
                }
            }
            if current.parent_id == parent {
                let revealed = self.reveal(&mut snapshot, parent).await;
                return Ok(MutationOutcome::new(Change::Unchanged, revealed));
            }

            let moved = current.with_parent(parent);
            snapshot.upsert_folder(moved.clone());
            self.repo.save(&snapshot).await?;

            let revealed = self.reveal(&mut snapshot, parent).await;
            Ok(MutationOutcome::new(Change::FolderUpserted(moved), revealed))
        }
        .await;
        finish("folder_move", started_at, result)
    }

    /// Writes an autosave draft into one note.
    pub async fn update_note(&self, id: NoteId, draft: &NoteDraft) -> MutationResult<Change> {
        let started_at = Instant::now();
        let result: MutationResult<Change> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let current = snapshot.note(id).ok_or(MutationError::NoteNotFound(id))?;
            let title = normalize_display_name(&draft.title).unwrap_or_else(|| current.title.clone());
            if title == current.title && draft.content == current.content {
                return Ok(Change::Unchanged);
            }

            let now_ms = now_epoch_ms();
            let mut updated = current.with_content(draft.content.as_str(), now_ms);
            updated.title = title;
            snapshot.upsert_note(updated.clone());
            self.repo.save(&snapshot).await?;
            Ok(Change::NoteUpserted(updated))
        }
        .await;
        finish("note_update", started_at, result)
    }

    /// Removes one note.
    pub async fn delete_note(&self, id: NoteId) -> MutationResult<Change> {
        let started_at = Instant::now();
        let result: MutationResult<Change> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            if !snapshot.remove_note(id) {
                return Err(MutationError::NoteNotFound(id));
            }
            self.repo.save(&snapshot).await?;
            Ok(Change::NoteRemoved(id))
        }
        .await;
        finish("note_delete", started_at, result)
    }

    /// Removes one folder, every descendant folder and every note filed in
    /// any of them, with a single save.
    pub async fn delete_folder(&self, id: FolderId) -> MutationResult<Change> {
        let started_at = Instant::now();
        let result: MutationResult<Change> = async {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = self.load_repaired().await?;
            let (subtree, note_ids) = {
                let index = HierarchyIndex::build(&snapshot);
                if !index.contains_folder(id) {
                    return Err(MutationError::FolderNotFound(id));
                }
                let subtree = index.subtree_folder_ids(id);
                let note_ids = index.note_ids_in(&subtree);
                (subtree, note_ids)
            };

            let folder_ids: Vec<FolderId> = snapshot
                .folders
                .iter()
                .map(|folder| folder.id)
                .filter(|folder_id| subtree.contains(folder_id))
                .collect();
            snapshot
                .folders
                .retain(|folder| !subtree.contains(&folder.id));
            snapshot.notes.retain(|note| {
                note.folder_id
                    .map_or(true, |folder_id| !subtree.contains(&folder_id))
            });
            self.repo.save(&snapshot).await?;

            info!(
                "event=folder_cascade module=mutation folders={} notes={}",
                folder_ids.len(),
                note_ids.len()
            );
            Ok(Change::FolderTreeRemoved {
                folder_ids,
                note_ids,
            })
        }
        .await;
        finish("folder_delete", started_at, result)
    }

    async fn load_repaired(&self) -> MutationResult<Snapshot> {
        let loaded = self.repo.load().await?;
        let (snapshot, report) = repair(loaded);
        if !report.is_clean() {
            warn!(
                "event=snapshot_repair module=mutation status=repaired store_key={} duplicate_folders={} duplicate_notes={} blank_names={} orphaned_folders={} broken_cycles={} unfiled_notes={}",
                self.repo.store_key(),
                report.duplicate_folders,
                report.duplicate_notes,
                report.blank_names,
                report.orphaned_folders,
                report.broken_cycles,
                report.unfiled_notes
            );
        }
        Ok(snapshot)
    }

    // Second write; the caller's primary save has already succeeded.
    async fn reveal(&self, snapshot: &mut Snapshot, folder_id: Option<FolderId>) -> Option<Folder> {
        let closed = snapshot.folder(folder_id?)?.clone();
        if closed.is_open {
            return None;
        }
        let opened = closed.with_open(true);
        snapshot.upsert_folder(opened.clone());
        match self.repo.save(snapshot).await {
            Ok(()) => Some(opened),
            Err(err) => {
                snapshot.upsert_folder(closed);
                warn!(
                    "event=folder_reveal module=mutation status=error folder_id={} error={}",
                    opened.id, err
                );
                None
            }
        }
    }
}

fn ensure_parent(snapshot: &Snapshot, parent_id: Option<FolderId>) -> MutationResult<()> {
    match parent_id {
        Some(parent_id) if !snapshot.contains_folder(parent_id) => {
            Err(MutationError::ParentNotFound(parent_id))
        }
        _ => Ok(()),
    }
}

fn finish<T>(event: &str, started_at: Instant, result: MutationResult<T>) -> MutationResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => info!("event={event} module=mutation status=ok duration_ms={duration_ms}"),
        Err(MutationError::Persistence(err)) => error!(
            "event={event} module=mutation status=error duration_ms={duration_ms} error_code=persistence error={err}"
        ),
        Err(err) => warn!(
            "event={event} module=mutation status=rejected duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
    result
}
