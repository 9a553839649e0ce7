//! JSON file snapshot gateway.
//!
//! Stores one collection per file, `<dir>/<store_key>.json`, the way a
//! local key-value blob would. Writes go to a sibling temp file that is then
//! renamed over the target, so a crash mid-write leaves the old snapshot.

use crate::model::snapshot::Snapshot;
use crate::repo::snapshot_repo::{normalize_store_key, RepoResult, SnapshotRepository};
use async_trait::async_trait;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Snapshot gateway over a single pretty-printed JSON file.
pub struct JsonFileSnapshotRepository {
    path: PathBuf,
    store_key: String,
}

impl JsonFileSnapshotRepository {
    /// Addresses `<dir>/<store_key>.json`. The file is created on first save.
    pub fn new(dir: impl AsRef<Path>, store_key: &str) -> RepoResult<Self> {
        let store_key = normalize_store_key(store_key)?;
        let path = dir.as_ref().join(format!("{store_key}.json"));
        Ok(Self { path, store_key })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl SnapshotRepository for JsonFileSnapshotRepository {
    fn store_key(&self) -> &str {
        self.store_key.as_str()
    }

    async fn load(&self) -> RepoResult<Snapshot> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(snapshot)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        debug!(
            "event=snapshot_save module=repo backend=json status=ok folders={} notes={}",
            snapshot.folders.len(),
            snapshot.notes.len()
        );
        Ok(())
    }

    async fn clear(&self) -> RepoResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileSnapshotRepository;
    use crate::model::folder::Folder;
    use crate::model::note::Note;
    use crate::model::snapshot::Snapshot;
    use crate::repo::snapshot_repo::{RepoError, SnapshotRepository};

    #[tokio::test]
    async fn missing_file_loads_empty_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileSnapshotRepository::new(dir.path(), "zennote_db").unwrap();
        assert!(repo.load().await.unwrap().is_empty());
        repo.clear().await.unwrap();
        repo.clear().await.unwrap();
    }

    #[tokio::test]
    async fn save_writes_folders_and_notes_shape() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileSnapshotRepository::new(dir.path().join("nested"), "db").unwrap();
        let folder = Folder::new("Work", None);
        let note = Note::new("Draft", Some(folder.id), 7);
        repo.save(&Snapshot::new(vec![folder.clone()], vec![note.clone()]))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(repo.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["folders"][0]["name"], "Work");
        assert_eq!(value["notes"][0]["folderId"], folder.id.to_string());
        assert!(!repo.path().with_extension("json.tmp").exists());

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.notes[0].id, note.id);
        assert_eq!(loaded.notes[0].updated_at, 7);
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileSnapshotRepository::new(dir.path(), "db").unwrap();
        std::fs::write(repo.path(), "{ not json").unwrap();
        assert!(matches!(repo.load().await, Err(RepoError::Serde(_))));
    }
}
