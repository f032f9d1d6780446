//! Remote note table over a PostgREST-compatible HTTP API.
//!
//! # Responsibility
//! - Map `RecordTable` calls onto `{url}/rest/v1/{table}` requests.
//! - Translate transport failures and non-success statuses into `RepoError`.
//!
//! # Invariants
//! - Every request carries `user_id=eq.<owner>`; no unscoped row access.
//! - Ids and timestamps are assigned by the caller, never by the remote side.
//! - Remote columns: `id, user_id, title, content, created_at, updated_at`.

use crate::model::note::Note;
use crate::repo::record_table::{NoteChanges, RecordTable, RepoError, RepoResult, TableKind};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const COUNT_EXACT: &str = "count=exact";

/// Connection settings for the remote table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestTableConfig {
    /// Project base URL, e.g. `https://xyz.example.co`.
    pub base_url: String,
    /// Anonymous/service key sent as `apikey` and bearer token.
    pub api_key: String,
    /// Table name under `/rest/v1/`.
    pub table: String,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Duration,
}

/// Remote row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NoteRow {
    id: String,
    user_id: String,
    title: String,
    content: String,
    created_at: i64,
    updated_at: i64,
}

impl From<&Note> for NoteRow {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            user_id: note.owner_id.clone(),
            title: note.title.clone(),
            content: note.body.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl TryFrom<NoteRow> for Note {
    type Error = RepoError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        let note = Note {
            id: row.id,
            owner_id: row.user_id,
            title: row.title,
            body: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        note.validate()
            .map_err(|err| RepoError::InvalidData(format!("remote note `{}`: {err}", note.id)))?;
        Ok(note)
    }
}

#[derive(Debug, Serialize)]
struct NotePatch<'a> {
    title: &'a str,
    content: &'a str,
    updated_at: i64,
}

/// PostgREST-style remote note table.
pub struct RestRecordTable {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl RestRecordTable {
    /// Builds the HTTP client with auth headers and timeout baked in.
    pub fn new(config: &RestTableConfig) -> RepoResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| RepoError::Transport(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: table_endpoint(&config.base_url, &config.table),
            timeout: config.timeout,
        })
    }

    async fn send(&self, op: &'static str, request: RequestBuilder) -> RepoResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| self.transport_error(op, err))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RepoError::Rejected {
            status: status.as_u16(),
            message: rejection_message(&body),
        })
    }

    async fn fetch_rows(&self, op: &'static str, request: RequestBuilder) -> RepoResult<Vec<Note>> {
        let response = self.send(op, request).await?;
        let rows: Vec<NoteRow> = response
            .json()
            .await
            .map_err(|err| self.transport_error(op, err))?;
        rows.into_iter().map(Note::try_from).collect()
    }

    async fn fetch_first(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> RepoResult<Option<Note>> {
        Ok(self.fetch_rows(op, request).await?.into_iter().next())
    }

    fn transport_error(&self, op: &'static str, err: reqwest::Error) -> RepoError {
        if err.is_timeout() {
            RepoError::Timeout {
                op,
                after_ms: self.timeout.as_millis(),
            }
        } else if err.is_decode() {
            RepoError::InvalidData(format!("undecodable `{op}` response: {err}"))
        } else {
            RepoError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RecordTable for RestRecordTable {
    fn kind(&self) -> TableKind {
        TableKind::Rest
    }

    async fn probe(&self) -> RepoResult<()> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "id"), ("limit", "1")]);
        self.send("probe", request).await?;
        Ok(())
    }

    async fn list(&self, owner_id: &str) -> RepoResult<Vec<Note>> {
        let request = self.client.get(&self.endpoint).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner_id)),
            ("order", "updated_at.desc,id.asc".to_string()),
        ]);
        self.fetch_rows("list", request).await
    }

    async fn get(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
        let request = self.client.get(&self.endpoint).query(&[
            ("select", "*".to_string()),
            ("id", eq(id)),
            ("user_id", eq(owner_id)),
        ]);
        self.fetch_first("get", request).await
    }

    async fn insert(&self, note: &Note) -> RepoResult<Note> {
        note.validate()?;
        let request = self
            .client
            .post(&self.endpoint)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&[NoteRow::from(note)]);
        match self.fetch_first("insert", request).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Err(RepoError::InvalidData(format!(
                "insert of `{}` returned no representation",
                note.id
            ))),
            Err(RepoError::Rejected { status: 409, .. }) => {
                Err(RepoError::Conflict(note.id.clone()))
            }
            Err(err) => Err(err),
        }
    }

    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        changes: &NoteChanges,
    ) -> RepoResult<Option<Note>> {
        let request = self
            .client
            .patch(&self.endpoint)
            .query(&[("id", eq(id)), ("user_id", eq(owner_id))])
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&NotePatch {
                title: &changes.title,
                content: &changes.body,
                updated_at: changes.updated_at,
            });
        self.fetch_first("update", request).await
    }

    async fn delete(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
        let request = self
            .client
            .delete(&self.endpoint)
            .query(&[("id", eq(id)), ("user_id", eq(owner_id))])
            .header(PREFER, RETURN_REPRESENTATION);
        self.fetch_first("delete", request).await
    }

    async fn count(&self, owner_id: &str) -> RepoResult<u64> {
        let request = self
            .client
            .head(&self.endpoint)
            .query(&[("select", "id".to_string()), ("user_id", eq(owner_id))])
            .header(PREFER, COUNT_EXACT);
        let response = self.send("count", request).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| RepoError::InvalidData("count response lacks Content-Range".into()))?;
        parse_content_range_total(range)
    }
}

fn header_value(value: &str) -> RepoResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| RepoError::Transport("api key contains invalid header characters".into()))
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

pub(crate) fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// Extracts the error message PostgREST puts in its JSON error body,
/// falling back to the raw body text.
pub(crate) fn rejection_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parses the total from `Content-Range` (`0-24/3573`, `*/0`).
pub(crate) fn parse_content_range_total(range: &str) -> RepoResult<u64> {
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| RepoError::InvalidData(format!("unparseable Content-Range `{range}`")))
}
