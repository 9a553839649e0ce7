//! Per-note debounced autosave bookkeeping.
//!
//! # Responsibility
//! - Hold at most one pending draft and one quiet-period timer per note.
//! - Hand out per-note write locks so writes for one note never overlap.
//!
//! # Invariants
//! - A new edit replaces the draft and restarts a timer that is still
//!   sleeping.
//! - A timer that fired and claimed its slot is no longer cancellable.
//! - A slot is cleared only by the write of its newest generation, or by
//!   discarding the note.
//! - A write lock is tracked only while some writer holds it.

use crate::model::id::NoteId;
use crate::service::mutation_service::NoteDraft;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::AbortHandle;

/// Persistence state of one note as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    /// No pending edits.
    Saved,
    /// Edits are waiting for the quiet period or are being written.
    Saving,
    /// The last write failed; the draft is still pending.
    Failed(String),
}

struct Slot {
    draft: NoteDraft,
    generation: u64,
    timer: Option<AbortHandle>,
    failure: Option<String>,
}

#[derive(Default)]
struct QueueState {
    slots: HashMap<NoteId, Slot>,
    write_locks: HashMap<NoteId, Arc<AsyncMutex<()>>>,
    next_generation: u64,
}

/// Debounce queue keyed by note id.
pub struct AutosaveQueue {
    quiet: Duration,
    state: Mutex<QueueState>,
}

impl AutosaveQueue {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Quiet period a timer waits before it fires.
    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// Stores `draft` as the newest edit of `id` and restarts its timer.
    ///
    /// `timer` receives the new generation and returns the task to spawn;
    /// the task should sleep for [`Self::quiet`] and then [`Self::claim`].
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, id: NoteId, draft: NoteDraft, timer: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let slot = state.slots.entry(id).or_insert_with(|| Slot {
            draft: NoteDraft::default(),
            generation,
            timer: None,
            failure: None,
        });
        if let Some(previous) = slot.timer.take() {
            previous.abort();
        }
        slot.draft = draft;
        slot.generation = generation;
        slot.failure = None;
        // Spawned under the lock so the handle is stored before the task can claim.
        slot.timer = Some(tokio::spawn(timer(generation)).abort_handle());
        generation
    }

    /// Marks the timer of `generation` as fired.
    ///
    /// Returns `false` when the slot was superseded, flushed or discarded in
    /// the meantime; the caller must then not write.
    pub fn claim(&self, id: NoteId, generation: u64) -> bool {
        let mut state = self.lock();
        match state.slots.get_mut(&id) {
            Some(slot) if slot.generation == generation && slot.timer.is_some() => {
                slot.timer = None;
                true
            }
            _ => false,
        }
    }

    /// Stops a still sleeping timer without dropping the draft.
    pub fn cancel_timer(&self, id: NoteId) {
        let mut state = self.lock();
        if let Some(timer) = state.slots.get_mut(&id).and_then(|slot| slot.timer.take()) {
            timer.abort();
        }
    }

    /// Newest pending draft and its generation.
    pub fn pending(&self, id: NoteId) -> Option<(NoteDraft, u64)> {
        self.lock()
            .slots
            .get(&id)
            .map(|slot| (slot.draft.clone(), slot.generation))
    }

    pub fn draft(&self, id: NoteId) -> Option<NoteDraft> {
        self.lock().slots.get(&id).map(|slot| slot.draft.clone())
    }

    /// Clears the slot if `generation` is still the newest edit.
    pub fn complete(&self, id: NoteId, generation: u64) {
        let mut state = self.lock();
        if state
            .slots
            .get(&id)
            .is_some_and(|slot| slot.generation == generation)
        {
            state.slots.remove(&id);
        }
    }

    /// Records a failed write; the draft stays pending without a timer.
    pub fn fail(&self, id: NoteId, generation: u64, message: String) {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get_mut(&id) {
            if slot.generation == generation {
                slot.failure = Some(message);
            }
        }
    }

    /// Drops any pending draft and timer of `id`.
    pub fn discard(&self, id: NoteId) -> bool {
        let mut state = self.lock();
        state.write_locks.remove(&id);
        match state.slots.remove(&id) {
            Some(slot) => {
                if let Some(timer) = slot.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn status(&self, id: NoteId) -> SaveStatus {
        match self.lock().slots.get(&id) {
            None => SaveStatus::Saved,
            Some(slot) => match &slot.failure {
                Some(message) => SaveStatus::Failed(message.clone()),
                None => SaveStatus::Saving,
            },
        }
    }

    /// Notes with a pending draft, in no particular order.
    pub fn pending_ids(&self) -> Vec<NoteId> {
        self.lock().slots.keys().copied().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.lock().slots.is_empty()
    }

    /// Lock serialising writes for `id`. Hand it back through
    /// [`Self::release_write_lock`] once the write is done.
    pub fn write_lock(&self, id: NoteId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.lock().write_locks.entry(id).or_default())
    }

    /// Drops the caller's handle and forgets the lock when no other writer
    /// holds or waits on it.
    pub fn release_write_lock(&self, id: NoteId, handle: Arc<AsyncMutex<()>>) {
        let mut state = self.lock();
        drop(handle);
        if state
            .write_locks
            .get(&id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            state.write_locks.remove(&id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
