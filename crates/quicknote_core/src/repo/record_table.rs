//! Owner-scoped record table contract.
//!
//! # Responsibility
//! - Define the one persistence seam every note backend implements.
//! - Define the error vocabulary shared by all table implementations.
//!
//! # Invariants
//! - Every row-level operation is filtered by owner equality.
//! - "Row absent" is `Ok(None)`, never an error.
//! - `list` orders by `updated_at DESC`, ties broken deterministically.

use crate::db::DbError;
use crate::model::note::{Note, NoteId, NoteValidationError};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of one table call.
#[derive(Debug)]
pub enum RepoError {
    /// SQLite transport or schema failure.
    Db(DbError),
    /// Network-level failure reaching a remote table.
    Transport(String),
    /// The call did not finish within its budget.
    Timeout { op: &'static str, after_ms: u128 },
    /// Remote table answered with a non-success status.
    Rejected { status: u16, message: String },
    /// A row with the same id already exists.
    Conflict(NoteId),
    /// Stored or returned data breaks note invariants.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Transport(message) => write!(f, "backend unreachable: {message}"),
            Self::Timeout { op, after_ms } => {
                write!(f, "backend call `{op}` timed out after {after_ms}ms")
            }
            Self::Rejected { status, message } => {
                write!(f, "backend rejected request (status {status}): {message}")
            }
            Self::Conflict(id) => write!(f, "note already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Which physical table served a call. Used for logging and health output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Memory,
    Sqlite,
    Rest,
}

impl TableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Rest => "rest",
        }
    }
}

/// Replacement fields for one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChanges {
    pub title: String,
    pub body: String,
    /// Requested stamp. Tables that can express it keep
    /// `max(stored, requested)`.
    pub updated_at: i64,
}

/// Owner-scoped note table.
#[async_trait]
pub trait RecordTable: Send + Sync {
    /// Physical table label.
    fn kind(&self) -> TableKind;

    /// Cheap read used once at startup to decide backend availability.
    async fn probe(&self) -> RepoResult<()>;

    /// All notes of `owner_id`, newest `updated_at` first.
    async fn list(&self, owner_id: &str) -> RepoResult<Vec<Note>>;

    async fn get(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>>;

    /// Persists a fully-formed note and returns the stored copy.
    async fn insert(&self, note: &Note) -> RepoResult<Note>;

    /// Replaces title/body of one owned note. `Ok(None)` when absent.
    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        changes: &NoteChanges,
    ) -> RepoResult<Option<Note>>;

    /// Removes one owned note and returns it. `Ok(None)` when absent.
    async fn delete(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>>;

    async fn count(&self, owner_id: &str) -> RepoResult<u64>;
}
