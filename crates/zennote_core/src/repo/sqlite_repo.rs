//! SQLite-backed snapshot gateway.
//!
//! # Responsibility
//! - Persist one store's folders and notes as rows keyed by `store_key`.
//! - Keep SQL details and row parsing inside the repository boundary.
//!
//! # Invariants
//! - `save` replaces every row of the store inside one IMMEDIATE
//!   transaction; readers never observe half of a snapshot.
//! - Rows are read back in `position` order, preserving collection order.
//! - Blocking SQLite work never runs on an async worker thread.

use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::folder::Folder;
use crate::model::note::Note;
use crate::model::snapshot::Snapshot;
use crate::repo::snapshot_repo::{normalize_store_key, RepoError, RepoResult, SnapshotRepository};
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Snapshot gateway over a migrated SQLite connection.
pub struct SqliteSnapshotRepository {
    conn: Arc<Mutex<Connection>>,
    store_key: String,
}

impl SqliteSnapshotRepository {
    /// Opens (and migrates) a database file for one store key.
    pub fn open(path: impl AsRef<Path>, store_key: &str) -> RepoResult<Self> {
        Self::from_connection(open_db(path)?, store_key)
    }

    /// Opens a private in-memory database for one store key.
    pub fn open_in_memory(store_key: &str) -> RepoResult<Self> {
        Self::from_connection(open_db_in_memory()?, store_key)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection, store_key: &str) -> RepoResult<Self> {
        Self::shared(Arc::new(Mutex::new(conn)), store_key)
    }

    /// Addresses another store key on a connection shared with other
    /// repositories.
    pub fn shared(conn: Arc<Mutex<Connection>>, store_key: &str) -> RepoResult<Self> {
        let store_key = normalize_store_key(store_key)?;
        {
            let guard = conn.lock().map_err(|_| DbError::ConnectionPoisoned)?;
            ensure_snapshot_connection_ready(&guard)?;
        }
        Ok(Self { conn, store_key })
    }

    /// Number of successful saves recorded for this store key.
    pub async fn revision(&self) -> RepoResult<i64> {
        self.run_blocking(|conn, store_key| {
            let revision: i64 = conn
                .query_row(
                    "SELECT revision FROM store_revisions WHERE store_key = ?1;",
                    [store_key],
                    |row| row.get(0),
                )
                .or_else(|err| match err {
                    rusqlite::Error::QueryReturnedNoRows => Ok(0),
                    other => Err(other),
                })?;
            Ok(revision)
        })
        .await
    }

    async fn run_blocking<T, F>(&self, work: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> RepoResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let store_key = self.store_key.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| DbError::ConnectionPoisoned)?;
            work(&mut guard, store_key.as_str())
        })
        .await
        .map_err(|err| RepoError::TaskJoin(err.to_string()))?
    }
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    fn store_key(&self) -> &str {
        self.store_key.as_str()
    }

    async fn load(&self) -> RepoResult<Snapshot> {
        self.run_blocking(|conn, store_key| load_snapshot(conn, store_key))
            .await
    }

    async fn save(&self, snapshot: &Snapshot) -> RepoResult<()> {
        let snapshot = snapshot.clone();
        self.run_blocking(move |conn, store_key| save_snapshot(conn, store_key, &snapshot))
            .await
    }

    async fn clear(&self) -> RepoResult<()> {
        self.run_blocking(|conn, store_key| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM folders WHERE store_key = ?1;", [store_key])?;
            tx.execute("DELETE FROM notes WHERE store_key = ?1;", [store_key])?;
            tx.execute(
                "DELETE FROM store_revisions WHERE store_key = ?1;",
                [store_key],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn load_snapshot(conn: &Connection, store_key: &str) -> RepoResult<Snapshot> {
    let mut folders = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, name, parent_id, is_open
             FROM folders
             WHERE store_key = ?1
             ORDER BY position ASC, id ASC;",
        )?;
        let mut rows = stmt.query([store_key])?;
        while let Some(row) = rows.next()? {
            folders.push(parse_folder_row(row)?);
        }
    }

    let mut notes = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, title, content, folder_id, updated_at
             FROM notes
             WHERE store_key = ?1
             ORDER BY position ASC, id ASC;",
        )?;
        let mut rows = stmt.query([store_key])?;
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
    }

    debug!(
        "event=snapshot_load module=repo backend=sqlite status=ok folders={} notes={}",
        folders.len(),
        notes.len()
    );
    Ok(Snapshot::new(folders, notes))
}

fn save_snapshot(conn: &mut Connection, store_key: &str, snapshot: &Snapshot) -> RepoResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM folders WHERE store_key = ?1;", [store_key])?;
    tx.execute("DELETE FROM notes WHERE store_key = ?1;", [store_key])?;

    {
        let mut insert_folder = tx.prepare(
            "INSERT INTO folders (store_key, id, name, parent_id, is_open, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        )?;
        for (position, folder) in snapshot.folders.iter().enumerate() {
            insert_folder.execute(params![
                store_key,
                folder.id.to_string(),
                folder.name.as_str(),
                folder.parent_id.map(|value| value.to_string()),
                bool_to_int(folder.is_open),
                position as i64,
            ])?;
        }

        let mut insert_note = tx.prepare(
            "INSERT INTO notes (store_key, id, title, content, folder_id, updated_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        )?;
        for (position, note) in snapshot.notes.iter().enumerate() {
            insert_note.execute(params![
                store_key,
                note.id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.folder_id.map(|value| value.to_string()),
                note.updated_at,
                position as i64,
            ])?;
        }
    }

    tx.execute(
        "INSERT INTO store_revisions (store_key, revision, saved_at)
         VALUES (?1, 1, strftime('%s', 'now') * 1000)
         ON CONFLICT(store_key) DO UPDATE
         SET revision = revision + 1,
             saved_at = excluded.saved_at;",
        [store_key],
    )?;
    tx.commit()?;

    debug!(
        "event=snapshot_save module=repo backend=sqlite status=ok folders={} notes={}",
        snapshot.folders.len(),
        snapshot.notes.len()
    );
    Ok(())
}

fn parse_folder_row(row: &Row<'_>) -> RepoResult<Folder> {
    let is_open = match row.get::<_, i64>("is_open")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_open value `{other}` in folders.is_open"
            )));
        }
    };

    Ok(Folder {
        id: parse_id(&row.get::<_, String>("id")?, "folders.id")?,
        name: row.get("name")?,
        parent_id: row
            .get::<_, Option<String>>("parent_id")?
            .map(|value| parse_id(&value, "folders.parent_id"))
            .transpose()?,
        is_open,
    })
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    Ok(Note {
        id: parse_id(&row.get::<_, String>("id")?, "notes.id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        folder_id: row
            .get::<_, Option<String>>("folder_id")?
            .map(|value| parse_id(&value, "notes.folder_id"))
            .transpose()?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_id<T: FromStr>(value: &str, column: &'static str) -> RepoResult<T> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid id `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_snapshot_connection_ready(conn: &Connection) -> RepoResult<()> {
    let required = latest_version();
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if found != required {
        return Err(DbError::SchemaNotReady { found, required }.into());
    }

    for table in ["folders", "notes", "store_revisions"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(DbError::MissingTable(table).into());
        }
    }
    Ok(())
}
