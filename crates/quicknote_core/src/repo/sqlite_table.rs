//! SQLite-backed note table.
//!
//! # Responsibility
//! - Provide a relational `RecordTable` over a migrated SQLite connection.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every statement filters by `owner_id`.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `updated_at` never moves backwards on update.
//! - Statements never run on an async worker thread.

use crate::db::{open_db, open_db_in_memory};
use crate::model::note::Note;
use crate::repo::record_table::{NoteChanges, RecordTable, RepoError, RepoResult, TableKind};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    title,
    body,
    created_at,
    updated_at
FROM notes";

/// Relational note table over one SQLite connection.
///
/// Statements run on the blocking pool, so a busy database never stalls
/// a runtime worker and the caller's timeout stays effective.
pub struct SqliteRecordTable {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordTable {
    /// Opens (or creates) a database file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database with the note schema.
    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn run<T, F>(&self, op: &'static str, work: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> RepoResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            work(&mut *guard)
        })
        .await
        .map_err(|err| RepoError::Transport(format!("sqlite `{op}` task failed: {err}")))?
    }
}

#[async_trait]
impl RecordTable for SqliteRecordTable {
    fn kind(&self) -> TableKind {
        TableKind::Sqlite
    }

    async fn probe(&self) -> RepoResult<()> {
        self.run("probe", |conn| {
            conn.query_row("SELECT COUNT(*) FROM notes LIMIT 1;", [], |row| {
                row.get::<_, i64>(0)
            })?;
            Ok(())
        })
        .await
    }

    async fn list(&self, owner_id: &str) -> RepoResult<Vec<Note>> {
        let owner_id = owner_id.to_string();
        self.run("list", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{NOTE_SELECT_SQL} WHERE owner_id = ?1 ORDER BY updated_at DESC, id ASC;"
            ))?;
            let mut rows = stmt.query([owner_id.as_str()])?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next()? {
                notes.push(parse_note_row(row)?);
            }
            Ok(notes)
        })
        .await
    }

    async fn get(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
        let (id, owner_id) = (id.to_string(), owner_id.to_string());
        self.run("get", move |conn| select_owned(conn, &id, &owner_id))
            .await
    }

    async fn insert(&self, note: &Note) -> RepoResult<Note> {
        note.validate()?;
        let note = note.clone();
        self.run("insert", move |conn| {
            let inserted = conn.execute(
                "INSERT INTO notes (id, owner_id, title, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    note.id.as_str(),
                    note.owner_id.as_str(),
                    note.title.as_str(),
                    note.body.as_str(),
                    note.created_at,
                    note.updated_at,
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation
                        && select_any(conn, note.id.as_str())? =>
                {
                    return Err(RepoError::Conflict(note.id.clone()));
                }
                Err(err) => return Err(err.into()),
            }

            select_owned(conn, note.id.as_str(), note.owner_id.as_str())?.ok_or_else(|| {
                RepoError::InvalidData(format!("inserted note `{}` missing on read-back", note.id))
            })
        })
        .await
    }

    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        changes: &NoteChanges,
    ) -> RepoResult<Option<Note>> {
        let (id, owner_id) = (id.to_string(), owner_id.to_string());
        let changes = changes.clone();
        self.run("update", move |conn| {
            let changed = conn.execute(
                "UPDATE notes
                 SET
                    title = ?3,
                    body = ?4,
                    updated_at = MAX(updated_at, ?5)
                 WHERE id = ?1
                   AND owner_id = ?2;",
                params![
                    id.as_str(),
                    owner_id.as_str(),
                    changes.title.as_str(),
                    changes.body.as_str(),
                    changes.updated_at,
                ],
            )?;

            if changed == 0 {
                return Ok(None);
            }
            select_owned(conn, &id, &owner_id)
        })
        .await
    }

    async fn delete(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
        let (id, owner_id) = (id.to_string(), owner_id.to_string());
        self.run("delete", move |conn| {
            let tx = conn.transaction()?;
            let Some(note) = select_owned(&tx, &id, &owner_id)? else {
                return Ok(None);
            };
            tx.execute(
                "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2;",
                params![id.as_str(), owner_id.as_str()],
            )?;
            tx.commit()?;
            Ok(Some(note))
        })
        .await
    }

    async fn count(&self, owner_id: &str) -> RepoResult<u64> {
        let owner_id = owner_id.to_string();
        self.run("count", move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notes WHERE owner_id = ?1;",
                [owner_id.as_str()],
                |row| row.get(0),
            )?;
            u64::try_from(count)
                .map_err(|_| RepoError::InvalidData(format!("negative note count `{count}`")))
        })
        .await
    }
}

fn select_owned(conn: &Connection, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL} WHERE id = ?1 AND owner_id = ?2;"
    ))?;
    let mut rows = stmt.query(params![id, owner_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_note_row(row)?)),
        None => Ok(None),
    }
}

fn select_any(conn: &Connection, id: &str) -> RepoResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM notes WHERE id = ?1;", [id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let note = Note {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    note.validate()
        .map_err(|err| RepoError::InvalidData(format!("note `{}`: {err}", note.id)))?;
    Ok(note)
}
