//! Dual-mode note store.
//!
//! # Responsibility
//! - Single entry point for note create/read/update/delete/count.
//! - Decide once whether the configured backend serves calls.
//! - Mask per-call backend failures with the in-memory fallback table.
//!
//! # Invariants
//! - Mode is decided by one probe and never changes afterwards.
//! - Every returned `Note` is a clone; callers never alias stored rows.
//! - Foreign-owner access is indistinguishable from absence (`NotFound`).
//! - `list_notes` is ordered by `updated_at DESC` and its length matches
//!   `count_notes` for the same owner.
//!
//! # See also
//! - docs/architecture/storage.md

use crate::config::{BackendConfig, ConfigError, StoreConfig};
use crate::model::note::{Note, NoteDraft, NoteId, NoteValidationError};
use crate::repo::memory_table::MemoryRecordTable;
use crate::repo::record_table::{NoteChanges, RecordTable, RepoError};
use crate::repo::rest_table::RestRecordTable;
use crate::repo::sqlite_table::SqliteRecordTable;
use crate::service::clock::NoteClock;
use crate::service::status::{
    ConnectionStatus, StorageKind, StoreHealth, StoreState, BACKEND_NOT_CONFIGURED,
};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

pub type StoreResult<T> = Result<T, StoreError>;

/// Machine-checkable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Backend,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Backend => "backend",
            Self::Configuration => "configuration",
        }
    }
}

/// Store-level error surfaced to the routing layer.
#[derive(Debug)]
pub enum StoreError {
    /// No note with this id for this owner.
    NotFound(NoteId),
    /// Input rejected before persistence.
    Validation(NoteValidationError),
    /// Storage failure that fallback could not mask.
    Backend(RepoError),
    /// Invalid store configuration.
    Configuration(ConfigError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Backend(_) => ErrorKind::Backend,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Validation(err) => write!(f, "invalid note: {err}"),
            Self::Backend(err) => write!(f, "storage failure: {err}"),
            Self::Configuration(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Validation(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::Configuration(err) => Some(err),
        }
    }
}

impl From<NoteValidationError> for StoreError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Backend(value)
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

enum BackendSlot {
    Unconfigured,
    /// Configured but could not even be constructed (bad file, bad key).
    Unavailable(String),
    Configured(Arc<dyn RecordTable>),
}

/// Note store that prefers a backend table and falls back to memory.
pub struct NoteStore {
    backend: BackendSlot,
    fallback: MemoryRecordTable,
    call_timeout: Duration,
    probe: OnceCell<ConnectionStatus>,
    state: AtomicU8,
    clock: NoteClock,
}

impl NoteStore {
    /// Memory-only store. Probing reports "backend not configured".
    pub fn in_memory() -> Self {
        Self::with_slot(BackendSlot::Unconfigured, StoreConfig::default().call_timeout)
    }

    /// Store that tries `backend` first, bounding every backend call by
    /// `call_timeout`.
    pub fn with_backend(backend: Arc<dyn RecordTable>, call_timeout: Duration) -> Self {
        Self::with_slot(BackendSlot::Configured(backend), call_timeout)
    }

    /// Builds the backend described by `config`.
    ///
    /// A backend that cannot be constructed is not an error here: the store
    /// starts, and probing reports the failure and selects fallback mode.
    pub fn from_config(config: &StoreConfig) -> Self {
        let slot = match &config.backend {
            BackendConfig::None => BackendSlot::Unconfigured,
            BackendConfig::Rest(rest) => match RestRecordTable::new(rest) {
                Ok(table) => BackendSlot::Configured(Arc::new(table)),
                Err(err) => unavailable("rest", err),
            },
            BackendConfig::Sqlite { path } => match SqliteRecordTable::open(path) {
                Ok(table) => BackendSlot::Configured(Arc::new(table)),
                Err(err) => unavailable("sqlite", err),
            },
        };
        Self::with_slot(slot, config.call_timeout)
    }

    /// Reads `StoreConfig` from the environment and builds the store.
    pub fn from_env() -> StoreResult<Self> {
        let config = StoreConfig::from_env()?;
        Ok(Self::from_config(&config))
    }

    fn with_slot(backend: BackendSlot, call_timeout: Duration) -> Self {
        Self {
            backend,
            fallback: MemoryRecordTable::new(),
            call_timeout,
            probe: OnceCell::new(),
            state: AtomicU8::new(StoreState::Uninitialized.to_u8()),
            clock: NoteClock::new(),
        }
    }

    pub fn state(&self) -> StoreState {
        StoreState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// "database" once backend mode is selected, "memory" otherwise.
    pub fn storage(&self) -> StorageKind {
        match self.state() {
            StoreState::Backend => StorageKind::Database,
            _ => StorageKind::Memory,
        }
    }

    /// Runs the startup probe on first call and returns its recorded result
    /// afterwards without touching the backend.
    pub async fn probe_connection(&self) -> ConnectionStatus {
        self.probe.get_or_init(|| self.run_probe()).await.clone()
    }

    pub async fn health(&self) -> StoreHealth {
        let connection = self.probe_connection().await;
        let backend = match &self.backend {
            BackendSlot::Configured(table) => Some(table.kind().as_str()),
            _ => None,
        };
        StoreHealth {
            state: self.state(),
            storage: self.storage(),
            backend,
            connection,
        }
    }

    /// Lists the caller's notes, most recently updated first.
    pub async fn list_notes(&self, owner_id: &str) -> StoreResult<Vec<Note>> {
        let mut notes = match self.active_backend().await {
            Some(table) => self
                .attempt("list_notes", table, table.list(owner_id))
                .await
                .unwrap_or_default(),
            None => Vec::new(),
        };

        // Rows parked in memory during a backend outage stay visible.
        let seen: HashSet<NoteId> = notes.iter().map(|note| note.id.clone()).collect();
        notes.extend(
            self.fallback
                .list(owner_id)
                .await?
                .into_iter()
                .filter(|note| !seen.contains(&note.id)),
        );
        notes.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(
            "event=note_list module=store status=ok storage={} count={}",
            self.storage().as_str(),
            notes.len()
        );
        Ok(notes)
    }

    /// Returns one owned note.
    pub async fn get_note(&self, id: &str, owner_id: &str) -> StoreResult<Note> {
        if let Some(table) = self.active_backend().await {
            if let Some(Some(note)) = self.attempt("get_note", table, table.get(id, owner_id)).await
            {
                return Ok(note);
            }
        }

        self.fallback
            .get(id, owner_id)
            .await?
            .ok_or_else(|| not_found("get_note", id))
    }

    /// Validates input, assigns id and timestamps, persists, returns the
    /// stored copy.
    pub async fn create_note(&self, owner_id: &str, title: &str, body: &str) -> StoreResult<Note> {
        if owner_id.trim().is_empty() {
            return Err(NoteValidationError::EmptyOwner.into());
        }
        let draft = NoteDraft::new(title, body)?;
        let note = Note::create(owner_id, draft, self.clock.tick());

        if let Some(table) = self.active_backend().await {
            if let Some(stored) = self.attempt("create_note", table, table.insert(&note)).await {
                log_write("note_create", table.kind().as_str(), &stored.id);
                return Ok(stored);
            }
        }

        let stored = self.fallback.insert(&note).await.map_err(fatal("create_note"))?;
        log_write("note_create", "memory", &stored.id);
        Ok(stored)
    }

    /// Replaces title and body of one owned note and refreshes `updated_at`.
    pub async fn update_note(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        body: &str,
    ) -> StoreResult<Note> {
        let draft = NoteDraft::new(title, body)?;
        let changes = NoteChanges {
            title: draft.title().to_string(),
            body: draft.body().to_string(),
            updated_at: self.clock.tick(),
        };

        if let Some(table) = self.active_backend().await {
            if let Some(Some(updated)) = self
                .attempt("update_note", table, table.update(id, owner_id, &changes))
                .await
            {
                self.drop_parked_twin("update_note", id, owner_id).await?;
                log_write("note_update", table.kind().as_str(), id);
                return Ok(updated);
            }
        }

        let updated = self
            .fallback
            .update(id, owner_id, &changes)
            .await
            .map_err(fatal("update_note"))?
            .ok_or_else(|| not_found("update_note", id))?;
        log_write("note_update", "memory", id);
        Ok(updated)
    }

    /// Permanently removes one owned note and returns what was removed.
    pub async fn delete_note(&self, id: &str, owner_id: &str) -> StoreResult<Note> {
        if let Some(table) = self.active_backend().await {
            if let Some(Some(deleted)) = self
                .attempt("delete_note", table, table.delete(id, owner_id))
                .await
            {
                self.drop_parked_twin("delete_note", id, owner_id).await?;
                log_write("note_delete", table.kind().as_str(), id);
                return Ok(deleted);
            }
        }

        let deleted = self
            .fallback
            .delete(id, owner_id)
            .await
            .map_err(fatal("delete_note"))?
            .ok_or_else(|| not_found("delete_note", id))?;
        log_write("note_delete", "memory", id);
        Ok(deleted)
    }

    /// Number of notes owned by `owner_id`.
    pub async fn count_notes(&self, owner_id: &str) -> StoreResult<u64> {
        let Some(table) = self.active_backend().await else {
            return Ok(self.fallback.count(owner_id).await?);
        };
        let parked = self.fallback.count(owner_id).await?;
        if parked == 0 {
            return Ok(self
                .attempt("count_notes", table, table.count(owner_id))
                .await
                .unwrap_or(0));
        }

        // An insert that timed out may still have landed remotely; only the
        // id-deduplicated listing counts such a note once.
        let listed = self.list_notes(owner_id).await?;
        Ok(listed.len() as u64)
    }

    /// Removes the fallback copy of a note the backend just updated or
    /// deleted. Such a copy exists after an insert timed out but still
    /// committed remotely.
    async fn drop_parked_twin(
        &self,
        op: &'static str,
        id: &str,
        owner_id: &str,
    ) -> StoreResult<()> {
        if let Some(twin) = self
            .fallback
            .delete(id, owner_id)
            .await
            .map_err(fatal(op))?
        {
            debug!(
                "event={op} module=store status=ok table=memory note_id={} dropped=parked_twin",
                twin.id
            );
        }
        Ok(())
    }

    async fn active_backend(&self) -> Option<&dyn RecordTable> {
        let status = self.probe.get_or_init(|| self.run_probe()).await;
        match (&self.backend, status.connected) {
            (BackendSlot::Configured(table), true) => Some(table.as_ref()),
            _ => None,
        }
    }

    async fn run_probe(&self) -> ConnectionStatus {
        self.set_state(StoreState::Probing);
        let started_at = Instant::now();

        let status = match &self.backend {
            BackendSlot::Unconfigured => ConnectionStatus::disconnected(BACKEND_NOT_CONFIGURED),
            BackendSlot::Unavailable(reason) => ConnectionStatus::disconnected(reason.clone()),
            BackendSlot::Configured(table) => {
                match tokio::time::timeout(self.call_timeout, table.probe()).await {
                    Ok(Ok(())) => ConnectionStatus::connected(),
                    Ok(Err(err)) => ConnectionStatus::disconnected(err.to_string()),
                    Err(_) => ConnectionStatus::disconnected(
                        RepoError::Timeout {
                            op: "probe",
                            after_ms: self.call_timeout.as_millis(),
                        }
                        .to_string(),
                    ),
                }
            }
        };

        if status.connected {
            self.set_state(StoreState::Backend);
            info!(
                "event=store_probe module=store status=ok mode=backend duration_ms={}",
                started_at.elapsed().as_millis()
            );
        } else {
            self.set_state(StoreState::Fallback);
            warn!(
                "event=store_probe module=store status=degraded mode=fallback duration_ms={} reason={}",
                started_at.elapsed().as_millis(),
                status.error.as_deref().unwrap_or("unknown")
            );
        }
        status
    }

    /// Runs one backend call under the call timeout. `None` means the call
    /// failed and the caller must complete against the fallback table.
    async fn attempt<T>(
        &self,
        op: &'static str,
        table: &dyn RecordTable,
        call: impl Future<Output = Result<T, RepoError>>,
    ) -> Option<T> {
        let started_at = Instant::now();
        let outcome = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RepoError::Timeout {
                op,
                after_ms: self.call_timeout.as_millis(),
            }),
        };

        match outcome {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    "event=backend_call module=store status=fallback op={op} table={} duration_ms={} error={err}",
                    table.kind().as_str(),
                    started_at.elapsed().as_millis()
                );
                None
            }
        }
    }

    fn set_state(&self, state: StoreState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

fn log_write(event: &str, table: &str, id: &str) {
    info!("event={event} module=store status=ok table={table} note_id={id}");
}

fn unavailable(kind: &str, err: RepoError) -> BackendSlot {
    error!("event=backend_open module=store status=error table={kind} error={err}");
    BackendSlot::Unavailable(format!("{kind} backend unavailable: {err}"))
}

fn not_found(op: &str, id: &str) -> StoreError {
    debug!("event={op} module=store status=not_found note_id={id}");
    StoreError::NotFound(id.to_string())
}

fn fatal(op: &'static str) -> impl Fn(RepoError) -> StoreError {
    move |err| {
        error!("event={op} module=store status=error table=memory error={err}");
        StoreError::Backend(err)
    }
}
