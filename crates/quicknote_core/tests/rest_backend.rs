use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use quicknote_core::{
    BackendConfig, Note, NoteChanges, NoteStore, RecordTable, RepoError, RestRecordTable,
    RestTableConfig, StorageKind, StoreConfig, StoreState,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One request as the remote table saw it.
#[derive(Debug, Clone)]
struct SeenRequest {
    method: Method,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: String,
}

impl SeenRequest {
    fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct Reply {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type", "application/json".to_string())],
            body: body.to_string(),
        }
    }
}

/// In-process PostgREST stand-in: records requests, answers from a queue.
#[derive(Clone, Default)]
struct RemoteTable {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
}

impl RemoteTable {
    fn reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn last(&self) -> SeenRequest {
        self.seen().last().cloned().unwrap()
    }
}

async fn answer(
    State(remote): State<RemoteTable>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    remote.seen.lock().unwrap().push(SeenRequest {
        method,
        query,
        headers,
        body,
    });
    let reply = remote
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Reply::json(StatusCode::INTERNAL_SERVER_ERROR, json!({})));

    let mut response = (reply.status, reply.body).into_response();
    for (name, value) in reply.headers {
        response
            .headers_mut()
            .insert(name, HeaderValue::from_str(&value).unwrap());
    }
    response
}

async fn serve_remote_table() -> (RemoteTable, RestTableConfig) {
    let remote = RemoteTable::default();
    let app = Router::new()
        .route("/rest/v1/notes", any(answer))
        .with_state(remote.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = RestTableConfig {
        base_url: format!("http://{addr}/"),
        api_key: "test-key".to_string(),
        table: "notes".to_string(),
        timeout: Duration::from_secs(5),
    };
    (remote, config)
}

fn remote_row(id: &str, owner: &str, title: &str, content: &str, stamp: i64) -> Value {
    json!({
        "id": id,
        "user_id": owner,
        "title": title,
        "content": content,
        "created_at": stamp,
        "updated_at": stamp,
    })
}

fn sample_note() -> Note {
    Note {
        id: "n-1".to_string(),
        owner_id: "u1".to_string(),
        title: "Groceries".to_string(),
        body: "milk".to_string(),
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000,
    }
}

fn unreachable_rest_config() -> StoreConfig {
    let timeout = Duration::from_millis(500);
    StoreConfig {
        // Port 9 (discard) is closed on test hosts; connects are refused.
        backend: BackendConfig::Rest(RestTableConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            table: "notes".to_string(),
            timeout,
        }),
        call_timeout: timeout,
    }
}

#[tokio::test]
async fn unreachable_rest_backend_reports_disconnected_and_serves_from_memory() {
    let store = NoteStore::from_config(&unreachable_rest_config());

    let health = store.health().await;
    assert!(!health.connection.connected);
    assert!(health.connection.error.is_some());
    assert_eq!(health.backend, Some("rest"));
    assert_eq!(health.state, StoreState::Fallback);
    assert_eq!(health.storage, StorageKind::Memory);

    let created = store.create_note("u1", "offline", "still works").await.unwrap();
    assert_eq!(store.list_notes("u1").await.unwrap(), vec![created.clone()]);
    assert_eq!(store.get_note(&created.id, "u1").await.unwrap(), created);
}

#[test]
fn rest_table_rejects_api_keys_that_cannot_be_sent_as_headers() {
    let config = RestTableConfig {
        base_url: "https://db.example.co".to_string(),
        api_key: "line\nbreak".to_string(),
        table: "notes".to_string(),
        timeout: Duration::from_secs(1),
    };
    assert!(RestRecordTable::new(&config).is_err());
}

#[tokio::test]
async fn bad_api_key_degrades_store_without_failing_startup() {
    let mut config = unreachable_rest_config();
    if let BackendConfig::Rest(rest) = &mut config.backend {
        rest.api_key = "line\nbreak".to_string();
    }
    let store = NoteStore::from_config(&config);

    let status = store.probe_connection().await;
    assert!(!status.connected);
    assert!(status.error.unwrap().starts_with("rest backend unavailable"));
    assert_eq!(store.count_notes("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn list_scopes_by_owner_orders_newest_first_and_maps_columns() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply::json(
        StatusCode::OK,
        json!([
            remote_row("n-2", "u1", "B", "second", 20),
            remote_row("n-1", "u1", "A", "first", 10),
        ]),
    ));

    let notes = table.list("u1").await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].id, "n-2");
    assert_eq!(notes[0].owner_id, "u1");
    assert_eq!(notes[0].body, "second");
    assert_eq!(notes[1].created_at, 10);

    let request = remote.last();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.query_value("user_id"), Some("eq.u1"));
    assert_eq!(request.query_value("order"), Some("updated_at.desc,id.asc"));
    assert_eq!(request.header("apikey"), Some("test-key"));
    assert_eq!(request.header("authorization"), Some("Bearer test-key"));
}

#[tokio::test]
async fn get_filters_by_id_and_owner_and_reports_absence() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply::json(StatusCode::OK, json!([])));

    assert_eq!(table.get("n-1", "u2").await.unwrap(), None);
    let request = remote.last();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.query_value("id"), Some("eq.n-1"));
    assert_eq!(request.query_value("user_id"), Some("eq.u2"));
}

#[tokio::test]
async fn insert_posts_remote_row_and_returns_representation() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    let note = sample_note();
    remote.reply(Reply::json(
        StatusCode::CREATED,
        json!([remote_row("n-1", "u1", "Groceries", "milk", 1_700_000_000_000)]),
    ));

    let stored = table.insert(&note).await.unwrap();
    assert_eq!(stored, note);

    let request = remote.last();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.header("prefer"), Some("return=representation"));
    let body = request.json_body();
    assert_eq!(body[0]["user_id"], "u1");
    assert_eq!(body[0]["content"], "milk");
    assert_eq!(body[0]["id"], "n-1");
}

#[tokio::test]
async fn duplicate_insert_maps_to_conflict() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply::json(
        StatusCode::CONFLICT,
        json!({"code": "23505", "message": "duplicate key value"}),
    ));

    let err = table.insert(&sample_note()).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(id) if id == "n-1"));
}

#[tokio::test]
async fn update_patches_title_content_and_stamp() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply::json(
        StatusCode::OK,
        json!([remote_row("n-1", "u1", "Groceries", "eggs", 1_700_000_000_500)]),
    ));
    remote.reply(Reply::json(StatusCode::OK, json!([])));

    let changes = NoteChanges {
        title: "Groceries".to_string(),
        body: "eggs".to_string(),
        updated_at: 1_700_000_000_500,
    };
    let updated = table.update("n-1", "u1", &changes).await.unwrap().unwrap();
    assert_eq!(updated.body, "eggs");

    let request = remote.last();
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.query_value("id"), Some("eq.n-1"));
    assert_eq!(request.query_value("user_id"), Some("eq.u1"));
    assert_eq!(request.header("prefer"), Some("return=representation"));
    let body = request.json_body();
    assert_eq!(body["content"], "eggs");
    assert_eq!(body["updated_at"], 1_700_000_000_500_i64);

    assert_eq!(table.update("n-9", "u1", &changes).await.unwrap(), None);
}

#[tokio::test]
async fn delete_returns_removed_row() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply::json(
        StatusCode::OK,
        json!([remote_row("n-1", "u1", "Groceries", "milk", 5)]),
    ));

    let deleted = table.delete("n-1", "u1").await.unwrap().unwrap();
    assert_eq!(deleted.id, "n-1");
    let request = remote.last();
    assert_eq!(request.method, Method::DELETE);
    assert_eq!(request.query_value("user_id"), Some("eq.u1"));
    assert_eq!(request.header("prefer"), Some("return=representation"));
}

#[tokio::test]
async fn count_reads_exact_total_from_content_range() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply {
        status: StatusCode::OK,
        headers: vec![("content-range", "0-2/3".to_string())],
        body: String::new(),
    });

    assert_eq!(table.count("u1").await.unwrap(), 3);
    let request = remote.last();
    assert_eq!(request.method, Method::HEAD);
    assert_eq!(request.header("prefer"), Some("count=exact"));
    assert_eq!(request.query_value("user_id"), Some("eq.u1"));
}

#[tokio::test]
async fn invalid_remote_rows_are_rejected() {
    let (remote, config) = serve_remote_table().await;
    let table = RestRecordTable::new(&config).unwrap();
    remote.reply(Reply::json(
        StatusCode::OK,
        json!([remote_row("n-1", "u1", "   ", "milk", 5)]),
    ));

    let err = table.get("n-1", "u1").await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[tokio::test]
async fn rejected_connection_check_surfaces_remote_message_and_selects_fallback() {
    let (remote, config) = serve_remote_table().await;
    remote.reply(Reply::json(
        StatusCode::UNAUTHORIZED,
        json!({"message": "Invalid API key"}),
    ));
    let store = NoteStore::from_config(&StoreConfig {
        call_timeout: config.timeout,
        backend: BackendConfig::Rest(config),
    });

    let status = store.probe_connection().await;
    assert!(!status.connected);
    assert!(status.error.unwrap().contains("Invalid API key"));
    assert_eq!(store.state(), StoreState::Fallback);
    assert_eq!(remote.seen().len(), 1);
}

#[tokio::test]
async fn reachable_remote_table_serves_the_store() {
    let (remote, config) = serve_remote_table().await;
    remote.reply(Reply::json(StatusCode::OK, json!([])));
    let store = NoteStore::from_config(&StoreConfig {
        call_timeout: config.timeout,
        backend: BackendConfig::Rest(config),
    });

    let health = store.health().await;
    assert!(health.connection.connected);
    assert_eq!(health.storage, StorageKind::Database);
    assert_eq!(health.backend, Some("rest"));

    remote.reply(Reply::json(
        StatusCode::OK,
        json!([remote_row("n-7", "u1", "Remote", "row", 42)]),
    ));
    let notes = store.list_notes("u1").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, "n-7");

    let seen = remote.seen();
    let first = &seen[0];
    assert_eq!(first.query_value("select"), Some("id"));
    assert_eq!(first.query_value("limit"), Some("1"));
}
