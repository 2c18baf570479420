#![allow(dead_code)]

//! In-process stand-in for the catalog API, served by axum on an ephemeral
//! port so the real reqwest client can be exercised end to end.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const TOKEN: &str = "letmein";

/// How `GET /sermons` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SermonMode {
    #[default]
    Normal,
    ServerError,
    Rejected,
    Garbage,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub live: Vec<Value>,
    pub sermons: Vec<Value>,
    pub sermon_mode: SermonMode,
    /// `(id, Authorization header)` per archive call.
    pub archive_calls: Vec<(String, Option<String>)>,
    pub list_session_queries: Vec<Option<String>>,
    pub created: Vec<Value>,
    /// `(method, raw request path, Authorization header)` per update/delete.
    pub mutations: Vec<(String, String, Option<String>)>,
    /// Ids whose update/delete answers `{success: false}`.
    pub locked: Vec<String>,
}

#[derive(Clone)]
pub struct MockApi {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .route("/api/live-sessions", get(list_sessions))
            .route("/api/live-sessions/:id/archive", post(archive_session))
            .route("/api/sermons", get(list_sermons).post(create_sermon))
            .route("/api/sermons/:id", put(update_sermon).delete(delete_sermon))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding mock catalog API")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

pub fn live_session(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Sunday Service {}", id),
        "description": "Morning worship",
        "host": "Pastor Ann",
        "category": "Worship",
        "startTime": "2024-03-10T09:30:00Z",
        "streamUrl": format!("https://stream.example.org/{}.m3u8", id),
        "status": "live",
        "viewers": 42
    })
}

pub fn sermon(id: &str, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "mainSpeaker": "Grace Lee",
        "description": "",
        "datePreached": "2024-01-07T10:00:00Z",
        "videoUrl": format!("https://video.example.org/{}.mp4", id),
        "duration": 2400,
        "views": 10,
        "series": "Advent",
        "tags": ["hope"],
        "status": status
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Unauthorized" })),
    )
        .into_response()
}

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

type Shared = State<Arc<Mutex<MockState>>>;

async fn list_sessions(State(state): Shared, Query(q): Query<StatusQuery>) -> Response {
    let mut state = state.lock().unwrap();
    state.list_session_queries.push(q.status.clone());
    let live: Vec<Value> = state
        .live
        .iter()
        .filter(|s| q.status.as_deref().map_or(true, |st| s["status"] == st))
        .cloned()
        .collect();
    ok(Value::Array(live))
}

async fn archive_session(
    State(state): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let auth = bearer(&headers);
    let mut state = state.lock().unwrap();
    state.archive_calls.push((id.clone(), auth.clone()));

    if auth.as_deref() != Some(&format!("Bearer {}", TOKEN)) {
        return unauthorized();
    }

    // The ended broadcast becomes a catalog entry.
    let archived = sermon(&format!("rec-{}", id), "Recorded Service", "published");
    state.sermons.push(archived);
    Json(json!({ "success": true, "message": "Session archived" })).into_response()
}

async fn list_sermons(State(state): Shared, Query(q): Query<StatusQuery>) -> Response {
    let state = state.lock().unwrap();
    match state.sermon_mode {
        SermonMode::Normal => {
            let sermons: Vec<Value> = state
                .sermons
                .iter()
                .filter(|s| q.status.as_deref().map_or(true, |st| s["status"] == st))
                .cloned()
                .collect();
            ok(Value::Array(sermons))
        }
        SermonMode::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
        }
        SermonMode::Rejected => {
            Json(json!({ "success": false, "message": "Catalog is in maintenance" }))
                .into_response()
        }
        SermonMode::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

async fn create_sermon(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {}", TOKEN).as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }

    let mut state = state.lock().unwrap();
    let id = format!("new-{}", state.created.len() + 1);
    let mut created = body.clone();
    created["id"] = json!(id);
    created["views"] = json!(0);
    state.created.push(body);
    ok(created)
}

/// Shared prologue for update/delete: record the call, then check the token
/// and the lock list.  `Err` is the response to send instead.
fn check_mutation(
    state: &mut MockState,
    method: &str,
    uri: &Uri,
    id: &str,
    headers: &HeaderMap,
) -> std::result::Result<(), Response> {
    let auth = bearer(headers);
    state
        .mutations
        .push((method.to_string(), uri.path().to_string(), auth.clone()));

    if auth.as_deref() != Some(&format!("Bearer {}", TOKEN)) {
        return Err(unauthorized());
    }
    if state.locked.iter().any(|locked| locked == id) {
        return Err(
            Json(json!({ "success": false, "message": "Sermon is locked" })).into_response(),
        );
    }
    Ok(())
}

async fn update_sermon(
    State(state): Shared,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Err(response) = check_mutation(&mut state, "PUT", &uri, &id, &headers) {
        return response;
    }

    let mut updated = body;
    updated["id"] = json!(id);
    updated["views"] = json!(0);
    match state.sermons.iter_mut().find(|s| s["id"] == id) {
        Some(existing) => *existing = updated.clone(),
        None => state.sermons.push(updated.clone()),
    }
    ok(updated)
}

async fn delete_sermon(
    State(state): Shared,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Err(response) = check_mutation(&mut state, "DELETE", &uri, &id, &headers) {
        return response;
    }

    let before = state.sermons.len();
    state.sermons.retain(|s| s["id"] != id);
    if state.sermons.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Sermon not found" })),
        )
            .into_response();
    }
    Json(json!({ "success": true, "message": "Sermon deleted" })).into_response()
}
