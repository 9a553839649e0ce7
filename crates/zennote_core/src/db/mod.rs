//! SQLite file layer under the snapshot gateway.
//!
//! # Responsibility
//! - Open database files with the pragmas the gateway relies on.
//! - Bring the folder/note/revision tables up to the latest schema.
//! - Report why a connection cannot host snapshot rows.
//!
//! # Invariants
//! - Schema state lives in `PRAGMA user_version`; a file written by a newer
//!   build is refused, never downgraded.
//! - A connection reaches the gateway only at the latest version with every
//!   snapshot table present.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures opening, migrating or sharing a snapshot database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// File carries a schema this build does not know.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection handed to the gateway was never migrated to the latest
    /// schema.
    SchemaNotReady { found: u32, required: u32 },
    /// Schema version matches but a snapshot table is gone.
    MissingTable(&'static str),
    /// A thread panicked while holding the shared connection.
    ConnectionPoisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "snapshot database uses schema {db_version}; this build reads up to {latest_supported}"
            ),
            Self::SchemaNotReady { found, required } => write!(
                f,
                "connection is at schema {found}; snapshot storage needs {required}"
            ),
            Self::MissingTable(table) => write!(f, "snapshot table `{table}` is missing"),
            Self::ConnectionPoisoned => write!(f, "shared sqlite connection is poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
