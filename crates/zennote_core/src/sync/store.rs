//! Caller-facing note store.
//!
//! # Responsibility
//! - Route every mutation through the service and fold the authoritative
//!   result into the visible collection.
//! - Debounce title/content edits into per-note autosave writes.
//!
//! # Invariants
//! - Visible state only changes after the matching gateway write succeeded.
//! - Commits (gateway write followed by merge) are applied in write order.
//! - Writes for one note never overlap; each flush writes the newest draft.
//! - Switching the active note flushes the previous note's pending draft.
//! - Removing a note, directly or by cascade, discards its pending draft.

use crate::config::StoreConfig;
use crate::hierarchy::index::HierarchyIndex;
use crate::hierarchy::repair::RepairReport;
use crate::model::folder::Folder;
use crate::model::id::{FolderId, NoteId};
use crate::model::normalize_display_name;
use crate::model::note::Note;
use crate::model::snapshot::Snapshot;
use crate::repo::snapshot_repo::{RepoError, SnapshotRepository};
use crate::search::{search, SearchHit, SearchQuery};
use crate::service::mutation_service::{
    Change, MutationError, MutationOutcome, MutationService, NoteDraft,
};
use crate::sync::autosave::{AutosaveQueue, SaveStatus};
use crate::sync::reconciler::Reconciler;
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from note store operations.
#[derive(Debug)]
pub enum StoreError {
    Mutation(MutationError),
    /// Drop payload is not shaped like a note id.
    InvalidTransferId(String),
    Repo(RepoError),
    /// Service result did not have the shape the operation guarantees.
    InconsistentState(&'static str),
}

impl StoreError {
    pub fn is_reference_error(&self) -> bool {
        matches!(self, Self::Mutation(err) if err.is_reference_error())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mutation(err) => write!(f, "{err}"),
            Self::InvalidTransferId(value) => write!(f, "invalid note transfer id `{value}`"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(message) => write!(f, "inconsistent store state: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mutation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::InvalidTransferId(_) | Self::InconsistentState(_) => None,
        }
    }
}

impl From<MutationError> for StoreError {
    fn from(value: MutationError) -> Self {
        Self::Mutation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Ids removed by one cascade delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedTree {
    pub folder_ids: Vec<FolderId>,
    pub note_ids: Vec<NoteId>,
}

struct ViewState {
    reconciler: Reconciler,
    active_note: Option<NoteId>,
}

struct StoreInner<R: SnapshotRepository> {
    service: MutationService<R>,
    view: Mutex<ViewState>,
    autosave: AutosaveQueue,
    commit_lock: AsyncMutex<()>,
}

/// Cheap-clone handle to one document store.
pub struct NoteStore<R: SnapshotRepository + 'static> {
    inner: Arc<StoreInner<R>>,
}

impl<R: SnapshotRepository + 'static> Clone for NoteStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: SnapshotRepository + 'static> NoteStore<R> {
    /// Loads the collection through `repo` and starts an empty autosave queue.
    pub async fn open(repo: Arc<R>, autosave_quiet: Duration) -> StoreResult<Self> {
        let service = MutationService::new(repo);
        let snapshot = service.load_snapshot().await?;
        info!(
            "event=store_open module=sync store_key={} folders={} notes={} quiet_ms={}",
            service.repository().store_key(),
            snapshot.folders.len(),
            snapshot.notes.len(),
            autosave_quiet.as_millis()
        );
        Ok(Self {
            inner: Arc::new(StoreInner {
                service,
                view: Mutex::new(ViewState {
                    reconciler: Reconciler::new(snapshot),
                    active_note: None,
                }),
                autosave: AutosaveQueue::new(autosave_quiet),
                commit_lock: AsyncMutex::new(()),
            }),
        })
    }

    pub async fn open_with_config(repo: Arc<R>, config: &StoreConfig) -> StoreResult<Self> {
        Self::open(repo, config.autosave_quiet()).await
    }

    pub fn service(&self) -> &MutationService<R> {
        &self.inner.service
    }

    pub fn snapshot(&self) -> Snapshot {
        self.view().reconciler.snapshot().clone()
    }

    pub fn folders(&self) -> Vec<Folder> {
        self.view().reconciler.snapshot().folders.clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.view().reconciler.snapshot().notes.clone()
    }

    pub fn folder(&self, id: FolderId) -> Option<Folder> {
        self.view().reconciler.snapshot().folder(id).cloned()
    }

    /// Last persisted version of a note, without pending edits.
    pub fn note(&self, id: NoteId) -> Option<Note> {
        self.view().reconciler.snapshot().note(id).cloned()
    }

    pub fn child_folders(&self, parent: Option<FolderId>) -> Vec<Folder> {
        let view = self.view();
        HierarchyIndex::build(view.reconciler.snapshot())
            .child_folders(parent)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn child_notes(&self, folder: Option<FolderId>) -> Vec<Note> {
        let view = self.view();
        HierarchyIndex::build(view.reconciler.snapshot())
            .child_notes(folder)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Note as the editor should show it: the pending draft over the
    /// persisted version.
    pub fn note_view(&self, id: NoteId) -> Option<Note> {
        let mut note = self.note(id)?;
        if let Some(draft) = self.inner.autosave.draft(id) {
            if let Some(title) = normalize_display_name(&draft.title) {
                note.title = title;
            }
            note.content = draft.content;
        }
        Some(note)
    }

    pub fn save_status(&self, id: NoteId) -> SaveStatus {
        self.inner.autosave.status(id)
    }

    pub fn active_note(&self) -> Option<NoteId> {
        self.view().active_note
    }

    /// Searches the visible collection.
    pub fn search(&self, query: &SearchQuery) -> Vec<SearchHit> {
        search(self.view().reconciler.snapshot(), query)
    }

    pub async fn create_folder(&self, name: &str, parent_id: Option<FolderId>) -> StoreResult<Folder> {
        let _commit = self.inner.commit_lock.lock().await;
        let outcome = self.inner.service.create_folder(name, parent_id).await?;
        self.apply_outcome(&outcome);
        outcome
            .change
            .folder()
            .cloned()
            .ok_or(StoreError::InconsistentState("create_folder returned no folder"))
    }

    pub async fn create_note(&self, title: &str, folder_id: Option<FolderId>) -> StoreResult<Note> {
        let _commit = self.inner.commit_lock.lock().await;
        let outcome = self.inner.service.create_note(title, folder_id).await?;
        self.apply_outcome(&outcome);
        outcome
            .change
            .note()
            .cloned()
            .ok_or(StoreError::InconsistentState("create_note returned no note"))
    }

    /// Blank names leave the folder unchanged.
    pub async fn rename_folder(&self, id: FolderId, name: &str) -> StoreResult<Folder> {
        let _commit = self.inner.commit_lock.lock().await;
        let change = self.inner.service.rename_folder(id, name).await?;
        self.apply(&change);
        self.visible_folder(id)
    }

    /// Blank titles leave the note unchanged.
    pub async fn rename_note(&self, id: NoteId, title: &str) -> StoreResult<Note> {
        let _commit = self.inner.commit_lock.lock().await;
        let change = self.inner.service.rename_note(id, title).await?;
        self.apply(&change);
        self.visible_note(id)
    }

    pub async fn toggle_folder(&self, id: FolderId) -> StoreResult<Folder> {
        let _commit = self.inner.commit_lock.lock().await;
        let change = self.inner.service.toggle_folder(id).await?;
        self.apply(&change);
        self.visible_folder(id)
    }

    pub async fn move_note(&self, id: NoteId, target: Option<FolderId>) -> StoreResult<Note> {
        let _commit = self.inner.commit_lock.lock().await;
        let outcome = self.inner.service.move_note(id, target).await?;
        self.apply_outcome(&outcome);
        self.visible_note(id)
    }

    /// Validates a drop payload as a note id before moving the note.
    pub async fn move_note_by_transfer(
        &self,
        payload: &str,
        target: Option<FolderId>,
    ) -> StoreResult<Note> {
        let id = NoteId::from_transfer(payload).map_err(|err| {
            debug!("event=note_transfer module=sync status=rejected error={err}");
            StoreError::InvalidTransferId(payload.to_string())
        })?;
        self.move_note(id, target).await
    }

    pub async fn move_folder(&self, id: FolderId, parent: Option<FolderId>) -> StoreResult<Folder> {
        let _commit = self.inner.commit_lock.lock().await;
        let outcome = self.inner.service.move_folder(id, parent).await?;
        self.apply_outcome(&outcome);
        self.visible_folder(id)
    }

    pub async fn delete_note(&self, id: NoteId) -> StoreResult<()> {
        let _commit = self.inner.commit_lock.lock().await;
        let change = self.inner.service.delete_note(id).await?;
        self.apply(&change);
        Ok(())
    }

    /// Removes the folder subtree and its notes; nothing is removed from
    /// visible state when the write fails.
    pub async fn delete_folder(&self, id: FolderId) -> StoreResult<RemovedTree> {
        let _commit = self.inner.commit_lock.lock().await;
        let change = self.inner.service.delete_folder(id).await?;
        self.apply(&change);
        match change {
            Change::FolderTreeRemoved {
                folder_ids,
                note_ids,
            } => Ok(RemovedTree {
                folder_ids,
                note_ids,
            }),
            _ => Err(StoreError::InconsistentState(
                "delete_folder returned no removal set",
            )),
        }
    }

    /// Records an edit; the write happens after the quiet period.
    ///
    /// A blank `title` keeps the stored title when the draft is written.
    pub async fn edit_note(&self, id: NoteId, title: &str, content: &str) -> StoreResult<()> {
        if self.note(id).is_none() {
            return Err(MutationError::NoteNotFound(id).into());
        }
        self.schedule(
            id,
            NoteDraft {
                title: title.to_string(),
                content: content.to_string(),
            },
        );
        Ok(())
    }

    /// Appends externally generated markup to the note's newest content.
    pub async fn append_to_note(&self, id: NoteId, markup: &str) -> StoreResult<()> {
        let base = match self.inner.autosave.draft(id) {
            Some(draft) => draft,
            None => {
                let note = self.note(id).ok_or(MutationError::NoteNotFound(id))?;
                NoteDraft {
                    title: note.title,
                    content: note.content,
                }
            }
        };
        self.schedule(
            id,
            NoteDraft {
                title: base.title,
                content: base.content + markup,
            },
        );
        Ok(())
    }

    /// Makes `next` the active note and flushes the previous one.
    pub async fn set_active_note(&self, next: Option<NoteId>) -> StoreResult<()> {
        if let Some(id) = next {
            if self.note(id).is_none() {
                return Err(MutationError::NoteNotFound(id).into());
            }
        }
        let previous = std::mem::replace(&mut self.view().active_note, next);
        match previous {
            Some(previous) if Some(previous) != next => self.flush(previous).await,
            _ => Ok(()),
        }
    }

    /// Writes the pending draft of `id` now instead of after the quiet period.
    pub async fn flush(&self, id: NoteId) -> StoreResult<()> {
        self.inner.autosave.cancel_timer(id);
        self.write_pending(id).await
    }

    /// Flushes every pending draft; returns the first failure after trying all.
    pub async fn flush_all(&self) -> StoreResult<()> {
        let mut first_error = None;
        for id in self.inner.autosave.pending_ids() {
            if let Err(err) = self.flush(id).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-reads the durable collection. Pending drafts of vanished notes are
    /// discarded.
    pub async fn reload(&self) -> StoreResult<()> {
        let _commit = self.inner.commit_lock.lock().await;
        self.reload_locked().await
    }

    /// Replaces the durable collection with a repaired `snapshot`.
    pub async fn import(&self, snapshot: Snapshot) -> StoreResult<RepairReport> {
        let _commit = self.inner.commit_lock.lock().await;
        let report = self.inner.service.import_snapshot(snapshot).await?;
        self.reload_locked().await?;
        Ok(report)
    }

    async fn reload_locked(&self) -> StoreResult<()> {
        let snapshot = self.inner.service.load_snapshot().await?;
        for id in self.inner.autosave.pending_ids() {
            if !snapshot.contains_note(id) {
                self.inner.autosave.discard(id);
            }
        }
        let mut view = self.view();
        if view
            .active_note
            .is_some_and(|id| !snapshot.contains_note(id))
        {
            view.active_note = None;
        }
        view.reconciler.replace(snapshot);
        Ok(())
    }

    fn schedule(&self, id: NoteId, draft: NoteDraft) {
        let store = self.clone();
        let quiet = self.inner.autosave.quiet();
        let generation = self.inner.autosave.schedule(id, draft, move |generation| async move {
            tokio::time::sleep(quiet).await;
            if !store.inner.autosave.claim(id, generation) {
                return;
            }
            if let Err(err) = store.write_pending(id).await {
                error!("event=autosave_timer module=sync status=error note_id={id} error={err}");
            }
        });
        debug!("event=autosave_schedule module=sync note_id={id} generation={generation}");
    }

    async fn write_pending(&self, id: NoteId) -> StoreResult<()> {
        let write_lock = self.inner.autosave.write_lock(id);
        let result = {
            let _writing = write_lock.lock().await;
            self.write_draft(id).await
        };
        self.inner.autosave.release_write_lock(id, write_lock);
        result
    }

    // Caller holds the note's write lock.
    async fn write_draft(&self, id: NoteId) -> StoreResult<()> {
        let Some((draft, generation)) = self.inner.autosave.pending(id) else {
            return Ok(());
        };

        let _commit = self.inner.commit_lock.lock().await;
        match self.inner.service.update_note(id, &draft).await {
            Ok(change) => {
                self.apply(&change);
                self.inner.autosave.complete(id, generation);
                info!(
                    "event=autosave_flush module=sync status=ok note_id={id} generation={generation}"
                );
                Ok(())
            }
            Err(err) => {
                if matches!(err, MutationError::NoteNotFound(_)) {
                    self.inner.autosave.discard(id);
                } else {
                    self.inner.autosave.fail(id, generation, err.to_string());
                }
                error!(
                    "event=autosave_flush module=sync status=error note_id={id} generation={generation} error={err}"
                );
                Err(err.into())
            }
        }
    }

    // Create/move outcomes never remove notes, so no draft bookkeeping.
    fn apply_outcome(&self, outcome: &MutationOutcome) {
        self.view().reconciler.apply_all(&outcome.changes());
    }

    fn apply(&self, change: &Change) {
        let mut view = self.view();
        view.reconciler.apply(change);
        let removed: &[NoteId] = match change {
            Change::NoteRemoved(id) => std::slice::from_ref(id),
            Change::FolderTreeRemoved { note_ids, .. } => note_ids,
            _ => &[],
        };
        for id in removed {
            self.inner.autosave.discard(*id);
            if view.active_note == Some(*id) {
                view.active_note = None;
            }
        }
    }

    fn visible_folder(&self, id: FolderId) -> StoreResult<Folder> {
        self.folder(id)
            .ok_or(StoreError::InconsistentState("folder missing after update"))
    }

    fn visible_note(&self, id: NoteId) -> StoreResult<Note> {
        self.note(id)
            .ok_or(StoreError::InconsistentState("note missing after update"))
    }

    fn view(&self) -> MutexGuard<'_, ViewState> {
        self.inner.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
