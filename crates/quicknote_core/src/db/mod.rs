//! SQLite persistence for the relational note backend.
//!
//! # Responsibility
//! - Hand `SqliteRecordTable` a connection whose `notes` schema is current.
//! - Name the database a failure belongs to, so probe reasons are actionable.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A database written by a newer build is refused, never downgraded.
//!
//! # See also
//! - docs/architecture/storage.md

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// SQLite-level failure.
#[derive(Debug)]
pub enum DbError {
    /// The database at `target` could not be opened or configured.
    Open {
        target: String,
        source: rusqlite::Error,
    },
    /// Statement failure on an open connection.
    Sqlite(rusqlite::Error),
    /// The file carries a schema this build does not know.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { target, source } => write!(f, "cannot open `{target}`: {source}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "notes schema version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
