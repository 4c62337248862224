//! HttpListApi against a stand-in backend served by axum on 127.0.0.1:0.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use grocer_core::{ItemDraft, Rank};
use grocer_sync::{
    HttpListApi, ListApi, ListSession, RemoteChange, RemoteEvent, SessionSettings, SyncConfig,
    SyncError,
};
use serde_json::{json, Value};
use tokio::time::timeout;

// =============================================================================
// Stand-in Backend
// =============================================================================

#[derive(Default)]
struct Inner {
    /// (group id, list document)
    lists: Vec<(String, Value)>,
    groups: Vec<Value>,
    saves: Vec<(String, Value)>,
    auth_headers: Vec<Option<String>>,
    push_frames: Vec<String>,
    close_after_push: bool,
    client_closed: bool,
    categorize_error: Option<String>,
}

#[derive(Clone, Default)]
struct Backend(Arc<Mutex<Inner>>);

impl Backend {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.with(|inner| inner.auth_headers.push(auth));
    }
}

type GroupQuery = Query<HashMap<String, String>>;

fn group_of(query: &HashMap<String, String>) -> String {
    query.get("groupId").cloned().unwrap_or_default()
}

async fn get_lists(State(b): State<Backend>, Query(q): GroupQuery, h: HeaderMap) -> Json<Value> {
    b.record_auth(&h);
    let group = group_of(&q);
    let lists: Vec<Value> = b.with(|inner| {
        inner
            .lists
            .iter()
            .filter(|(g, _)| *g == group)
            .map(|(_, list)| json!({ "id": list["id"], "weekStart": list["weekStart"] }))
            .collect()
    });
    Json(Value::Array(lists))
}

async fn create_list(
    State(b): State<Backend>,
    Query(q): GroupQuery,
    h: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    b.record_auth(&h);
    let list = b.with(|inner| {
        let list = json!({
            "id": format!("L{}", inner.lists.len() + 1),
            "weekStart": body["weekStart"],
            "items": [],
        });
        inner.lists.push((group_of(&q), list.clone()));
        list
    });
    Json(list)
}

async fn get_list(
    State(b): State<Backend>,
    Path(id): Path<String>,
    Query(q): GroupQuery,
    h: HeaderMap,
) -> Response {
    b.record_auth(&h);
    let group = group_of(&q);
    let found = b.with(|inner| {
        inner
            .lists
            .iter()
            .find(|(g, list)| *g == group && list["id"] == id.as_str())
            .map(|(_, list)| list.clone())
    });
    match found {
        Some(list) => Json(list).into_response(),
        None => (StatusCode::NOT_FOUND, "no such list").into_response(),
    }
}

async fn save_list(
    State(b): State<Backend>,
    Path(id): Path<String>,
    h: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    b.record_auth(&h);
    b.with(|inner| {
        if let Some((_, list)) = inner.lists.iter_mut().find(|(_, l)| l["id"] == id.as_str()) {
            list["items"] = body["items"].clone();
        }
        inner.saves.push((id, body));
    });
    StatusCode::NO_CONTENT
}

async fn categorize(State(b): State<Backend>, Path(id): Path<String>) -> Response {
    let (error, items) = b.with(|inner| {
        let items = inner
            .lists
            .iter()
            .find(|(_, l)| l["id"] == id.as_str())
            .map(|(_, l)| l["items"].clone())
            .unwrap_or_else(|| json!([]));
        (inner.categorize_error.clone(), items)
    });
    match error {
        Some(text) => (StatusCode::INTERNAL_SERVER_ERROR, text).into_response(),
        None => {
            let mut out = vec![json!({
                "id": "produce", "text": "Produce", "checked": false,
                "order": "5", "isSection": true
            })];
            out.extend(items.as_array().cloned().unwrap_or_default());
            Json(Value::Array(out)).into_response()
        }
    }
}

async fn get_groups(State(b): State<Backend>) -> Json<Value> {
    Json(Value::Array(b.with(|inner| inner.groups.clone())))
}

async fn create_group(State(b): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    let group = b.with(|inner| {
        let group = json!({ "id": format!("G{}", inner.groups.len() + 1), "name": body["name"] });
        inner.groups.push(group.clone());
        group
    });
    Json(group)
}

async fn ws_list(ws: WebSocketUpgrade, State(b): State<Backend>, h: HeaderMap) -> Response {
    b.record_auth(&h);
    ws.on_upgrade(move |socket| push_frames(socket, b))
}

async fn push_frames(mut socket: WebSocket, b: Backend) {
    let (frames, close) = b.with(|inner| (inner.push_frames.clone(), inner.close_after_push));
    for frame in frames {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    if close {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Close(_) = message {
            b.with(|inner| inner.client_closed = true);
            break;
        }
    }
}

async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/list", get(get_lists).post(create_list))
        .route("/api/list/{id}", get(get_list).post(save_list))
        .route("/api/list/categorize/{id}", post(categorize))
        .route("/api/group", get(get_groups).post(create_group))
        .route("/api/ws/list/{id}", get(ws_list))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base_url: String) -> HttpListApi {
    let mut config = SyncConfig::default();
    config.api.base_url = base_url;
    config.api.auth_token = Some("test-token".into());
    HttpListApi::new(&config).unwrap()
}

fn seed_list(backend: &Backend, group: &str, id: &str, items: Value) {
    backend.with(|inner| {
        inner.lists.push((
            group.to_string(),
            json!({ "id": id, "weekStart": "2024-03-04T00:00:00.000Z", "items": items }),
        ))
    });
}

// =============================================================================
// REST
// =============================================================================

#[tokio::test]
async fn fetch_missing_list_is_none() {
    let backend = Backend::default();
    let api = client(spawn_backend(backend.clone()).await);

    assert!(api.fetch_list("G", "nope").await.unwrap().is_none());
    assert_eq!(
        backend.with(|inner| inner.auth_headers.clone()),
        vec![Some("Bearer test-token".to_string())]
    );
}

#[tokio::test]
async fn create_then_find_list_by_group() {
    let backend = Backend::default();
    let api = client(spawn_backend(backend.clone()).await);
    let monday = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();

    let created = api.create_list("G", monday).await.unwrap();
    assert_eq!(created.week_start, monday);
    assert_eq!(created.items, Some(vec![]));

    let lists = api.fetch_lists_for_group("G").await.unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].id, created.id);
    assert!(lists[0].items.is_none());
    assert!(api.fetch_lists_for_group("other").await.unwrap().is_empty());

    let fetched = api.fetch_list("G", &created.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
}

#[tokio::test]
async fn save_posts_full_item_list() {
    let backend = Backend::default();
    seed_list(&backend, "G", "L1", json!([]));
    let api = client(spawn_backend(backend.clone()).await);

    let item = ItemDraft::section("Dairy").with_id("s1").into_item(Rank::middle());
    api.save_list("G", "L1", vec![item]).await.unwrap();

    let saves = backend.with(|inner| inner.saves.clone());
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].0, "L1");
    assert_eq!(
        saves[0].1,
        json!({ "items": [{ "id": "s1", "text": "Dairy", "checked": false, "order": "i", "isSection": true }] })
    );
}

#[tokio::test]
async fn categorize_returns_items_or_surfaces_error_text() {
    let backend = Backend::default();
    seed_list(
        &backend,
        "G",
        "L1",
        json!([{ "id": "a", "text": "Apples", "checked": false, "order": "i" }]),
    );
    let api = client(spawn_backend(backend.clone()).await);

    let items = api.categorize("G", "L1").await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_section);

    backend.with(|inner| inner.categorize_error = Some("model offline".into()));
    let err = api.categorize("G", "L1").await.unwrap_err();
    assert!(matches!(err, SyncError::Categorize(ref msg) if msg == "model offline"));
}

#[tokio::test]
async fn groups_round_trip() {
    let backend = Backend::default();
    let api = client(spawn_backend(backend).await);

    let group = api.create_group("Flatmates").await.unwrap();
    assert_eq!(group.name, "Flatmates");
    assert_eq!(api.fetch_groups().await.unwrap(), vec![group]);
}

#[tokio::test]
async fn unreachable_backend_is_a_connection_failure() {
    // Bind and drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(format!("http://{}/api", addr));
    let err = api.fetch_lists_for_group("G").await.unwrap_err();
    assert!(
        matches!(err, SyncError::ConnectionFailed(_)),
        "unexpected error: {err}"
    );
}

// =============================================================================
// WebSocket Push
// =============================================================================

#[tokio::test]
async fn push_frames_are_decoded_and_garbage_skipped() {
    let backend = Backend::default();
    seed_list(&backend, "G", "L1", json!([]));
    backend.with(|inner| {
        inner.push_frames = vec![
            "not json".into(),
            json!({ "id": "L1", "items": [{ "id": "a", "text": "Milk", "order": "i" }] })
                .to_string(),
        ];
        inner.close_after_push = true;
    });
    let api = client(spawn_backend(backend).await);

    let mut subscription = api.subscribe("G", "L1").await.unwrap();
    let wait = Duration::from_secs(5);

    match timeout(wait, subscription.next_event()).await.unwrap() {
        Some(RemoteEvent::Updated(update)) => {
            assert_eq!(update.items.len(), 1);
            assert_eq!(update.items[0].text, "Milk");
        }
        other => panic!("expected update, got {:?}", other),
    }
    assert!(matches!(
        timeout(wait, subscription.next_event()).await.unwrap(),
        Some(RemoteEvent::Error(_))
    ));
    assert_eq!(timeout(wait, subscription.next_event()).await.unwrap(), None);
}

#[tokio::test]
async fn unsubscribe_sends_close_frame() {
    let backend = Backend::default();
    seed_list(&backend, "G", "L1", json!([]));
    let api = client(spawn_backend(backend.clone()).await);

    let subscription = api.subscribe("G", "L1").await.unwrap();
    subscription.unsubscribe();

    let closed = timeout(Duration::from_secs(5), async {
        while !backend.with(|inner| inner.client_closed) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(closed.is_ok(), "backend never saw the close frame");
}

// =============================================================================
// Full Session
// =============================================================================

#[tokio::test]
async fn session_over_http() {
    let backend = Backend::default();
    backend.with(|inner| {
        inner.push_frames = vec![json!({
            "items": [
                { "id": "a", "text": "Milk", "checked": false, "order": "i" },
                { "id": "b", "text": "Eggs", "checked": true, "order": "j" }
            ]
        })
        .to_string()];
    });
    let api = Arc::new(client(spawn_backend(backend.clone()).await));
    let settings = SessionSettings {
        save_debounce_ms: 20,
        ..Default::default()
    };
    let wednesday = Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap();

    // No list yet: looked up by week, then created.
    let mut session = ListSession::open(api, "G", None, wednesday, &settings)
        .await
        .unwrap();
    assert_eq!(session.list_id(), "L1");
    assert_eq!(
        backend.with(|inner| inner.lists[0].1["weekStart"].clone()),
        json!("2024-03-04T00:00:00.000Z")
    );

    let change = timeout(Duration::from_secs(5), session.next_remote_event())
        .await
        .unwrap();
    assert_eq!(change, Some(RemoteChange::Replaced));
    assert_eq!(session.store().len(), 2);

    session.insert_after("a", ItemDraft::item("Butter"));
    session.close().await;

    let saves = backend.with(|inner| inner.saves.clone());
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].1["items"].as_array().unwrap().len(), 3);

    let closed = timeout(Duration::from_secs(5), async {
        while !backend.with(|inner| inner.client_closed) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(backend
        .with(|inner| inner.auth_headers.clone())
        .iter()
        .all(|h| h.as_deref() == Some("Bearer test-token")));
}
