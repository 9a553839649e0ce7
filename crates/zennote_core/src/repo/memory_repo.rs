//! In-memory snapshot gateway.
//!
//! Used for ephemeral stores and as the controllable backend in tests: it
//! counts saves, can delay them to simulate a slow medium, and can be told
//! to fail upcoming loads or saves.

use crate::model::snapshot::Snapshot;
use crate::repo::snapshot_repo::{normalize_store_key, RepoError, RepoResult, SnapshotRepository};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct MemoryState {
    snapshot: Snapshot,
    save_count: usize,
    fail_next_saves: usize,
    saves_before_failure: usize,
    fail_next_loads: usize,
    save_delay: Option<Duration>,
}

/// Snapshot gateway holding the collection in process memory.
pub struct MemorySnapshotRepository {
    store_key: String,
    state: Mutex<MemoryState>,
}

impl MemorySnapshotRepository {
    pub fn new(store_key: &str) -> RepoResult<Self> {
        Self::with_snapshot(store_key, Snapshot::default())
    }

    /// Starts from an already populated collection.
    pub fn with_snapshot(store_key: &str, snapshot: Snapshot) -> RepoResult<Self> {
        Ok(Self {
            store_key: normalize_store_key(store_key)?,
            state: Mutex::new(MemoryState {
                snapshot,
                ..MemoryState::default()
            }),
        })
    }

    /// Makes the next `count` saves fail with [`RepoError::Unavailable`].
    pub fn fail_next_saves(&self, count: usize) {
        self.fail_saves_after(0, count);
    }

    /// Lets `successes` saves through, then fails the following `count`.
    pub fn fail_saves_after(&self, successes: usize, count: usize) {
        let mut state = self.lock();
        state.saves_before_failure = successes;
        state.fail_next_saves = count;
    }

    /// Makes the next `count` loads fail with [`RepoError::Unavailable`].
    pub fn fail_next_loads(&self, count: usize) {
        self.lock().fail_next_loads = count;
    }

    /// Delays every save by `delay` before it takes effect.
    pub fn set_save_delay(&self, delay: Option<Duration>) {
        self.lock().save_delay = delay;
    }

    /// Number of saves that took effect.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Currently stored collection.
    pub fn stored(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SnapshotRepository for MemorySnapshotRepository {
    fn store_key(&self) -> &str {
        self.store_key.as_str()
    }

    async fn load(&self) -> RepoResult<Snapshot> {
        let mut state = self.lock();
        if state.fail_next_loads > 0 {
            state.fail_next_loads -= 1;
            return Err(RepoError::Unavailable("injected load failure".to_string()));
        }
        Ok(state.snapshot.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> RepoResult<()> {
        let delay = self.lock().save_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail_next_saves > 0 {
            if state.saves_before_failure > 0 {
                state.saves_before_failure -= 1;
            } else {
                state.fail_next_saves -= 1;
                return Err(RepoError::Unavailable("injected save failure".to_string()));
            }
        }
        state.snapshot = snapshot.clone();
        state.save_count += 1;
        Ok(())
    }

    async fn clear(&self) -> RepoResult<()> {
        self.lock().snapshot = Snapshot::default();
        Ok(())
    }
}
