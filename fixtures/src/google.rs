//! Mock of the Google OAuth token endpoint and the YouTube liveBroadcasts
//! insert / resumable thumbnail upload API.
//!
//! Served standalone by the `google` binary, or mounted in-process by
//! integration tests via [`google_router`]; the returned [`GoogleMock`]
//! handle records the traffic the mock observed and carries the failure
//! switches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::Bytes,
    extract::{Host, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde_json::json;
use uuid::Uuid;

/// Broadcast id assigned to every insert.
pub const BROADCAST_ID: &str = "abc123";

/// Authorization code the token endpoint rejects as an invalid grant.
pub const REJECTED_CODE: &str = "bad-code";

/// One chunk PUT observed by an upload session.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// First byte offset from the Content-Range header.
    pub start: u64,
    /// Last byte offset (inclusive) from the Content-Range header.
    pub end: u64,
    /// Body length actually received.
    pub len: u64,
}

/// A resumable upload session opened against the thumbnail endpoint.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub broadcast_id: String,
    pub content_type: String,
    pub declared_total: u64,
    pub received: u64,
}

#[derive(Default)]
struct Inner {
    token_requests: Vec<HashMap<String, String>>,
    omit_refresh_token: bool,
    broadcasts: Vec<serde_json::Value>,
    fail_insert: bool,
    sessions: HashMap<String, SessionRecord>,
    session_order: Vec<String>,
    chunks: Vec<ChunkRecord>,
    fail_chunk_index: Option<usize>,
}

/// Handle over the mock's observed traffic and failure switches.
#[derive(Clone, Default)]
pub struct GoogleMock {
    inner: Arc<Mutex<Inner>>,
}

impl GoogleMock {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock state poisoned")
    }

    /// Every form body the token endpoint received.
    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.lock().token_requests.clone()
    }

    /// Make token exchanges answer without a refresh_token.
    pub fn omit_refresh_token(&self, omit: bool) {
        self.lock().omit_refresh_token = omit;
    }

    /// Every broadcast insert payload received.
    pub fn broadcasts(&self) -> Vec<serde_json::Value> {
        self.lock().broadcasts.clone()
    }

    /// Make broadcast inserts fail with a 500.
    pub fn fail_insert(&self, fail: bool) {
        self.lock().fail_insert = fail;
    }

    /// Sizes of the chunk bodies received, in order.
    pub fn chunk_sizes(&self) -> Vec<u64> {
        self.lock().chunks.iter().map(|c| c.len).collect()
    }

    /// Fail the chunk with the given zero-based index with a 500. The
    /// failed chunk is not recorded as received.
    pub fn fail_chunk(&self, index: usize) {
        self.lock().fail_chunk_index = Some(index);
    }

    /// Upload sessions in creation order.
    pub fn sessions(&self) -> Vec<SessionRecord> {
        let inner = self.lock();
        inner
            .session_order
            .iter()
            .filter_map(|id| inner.sessions.get(id).cloned())
            .collect()
    }
}

/// Build the mock router and the handle observing it.
pub fn google_router() -> (Router, GoogleMock) {
    let mock = GoogleMock::default();
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/token", post(token))
        .route("/youtube/v3/liveBroadcasts", post(insert_broadcast))
        .route(
            "/upload/youtube/v3/thumbnails/set",
            post(open_upload_session),
        )
        .route("/upload/session/:session_id", put(put_chunk))
        .with_state(mock.clone());
    (router, mock)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn token(
    State(mock): State<GoogleMock>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    let code = params.get("code").cloned().unwrap_or_default();
    let grant_type = params.get("grant_type").cloned().unwrap_or_default();

    let omit_refresh = {
        let mut inner = mock.lock();
        inner.token_requests.push(params);
        inner.omit_refresh_token
    };

    if grant_type == "authorization_code" && code.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_request",
                "error_description": "Missing authorization code"
            })),
        )
            .into_response();
    }

    if code == REJECTED_CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }

    let mut body = json!({
        "access_token": format!("access-{}", Uuid::new_v4()),
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "https://www.googleapis.com/auth/youtube",
    });
    // Refresh grants never reissue a refresh token; code exchanges do
    // unless the test asked for an incomplete grant.
    if grant_type == "authorization_code" && !omit_refresh {
        body["refresh_token"] = json!(format!("refresh-{}", Uuid::new_v4()));
    }

    Json(body).into_response()
}

async fn insert_broadcast(
    State(mock): State<GoogleMock>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    if !headers.contains_key(header::AUTHORIZATION) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "Login Required" } })),
        )
            .into_response();
    }

    let fail = {
        let mut inner = mock.lock();
        inner.broadcasts.push(payload);
        inner.fail_insert
    };

    if fail {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "Backend Error" } })),
        )
            .into_response();
    }

    Json(json!({ "kind": "youtube#liveBroadcast", "id": BROADCAST_ID })).into_response()
}

async fn open_upload_session(
    State(mock): State<GoogleMock>,
    Host(host): Host,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(broadcast_id) = params.get("videoId").cloned() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "message": "videoId is required" } })),
        )
            .into_response();
    };

    let content_type = header_str(&headers, "x-upload-content-type").unwrap_or_default();
    let declared_total = header_str(&headers, "x-upload-content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let session_id = Uuid::new_v4().to_string();
    {
        let mut inner = mock.lock();
        inner.sessions.insert(
            session_id.clone(),
            SessionRecord {
                broadcast_id,
                content_type,
                declared_total,
                received: 0,
            },
        );
        inner.session_order.push(session_id.clone());
    }

    let location = format!("http://{host}/upload/session/{session_id}");
    ([(header::LOCATION, location)], StatusCode::OK).into_response()
}

async fn put_chunk(
    State(mock): State<GoogleMock>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((start, end, total)) =
        header_str(&headers, "content-range").and_then(|v| parse_content_range(&v))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "message": "malformed Content-Range" } })),
        )
            .into_response();
    };

    let mut inner = mock.lock();

    if inner.fail_chunk_index == Some(inner.chunks.len()) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "Backend Error" } })),
        )
            .into_response();
    }

    let Some(session) = inner.sessions.get(&session_id).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if session.declared_total != total {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "message": "total size does not match the session" } })),
        )
            .into_response();
    }

    inner.chunks.push(ChunkRecord {
        start,
        end,
        len: body.len() as u64,
    });
    let received = end + 1;
    if let Some(session) = inner.sessions.get_mut(&session_id) {
        session.received = received;
    }

    if received >= total {
        Json(json!({ "kind": "youtube#thumbnailSetResponse" })).into_response()
    } else {
        // 308 Resume Incomplete: more chunks expected.
        (
            StatusCode::PERMANENT_REDIRECT,
            [(header::RANGE, format!("bytes=0-{end}"))],
        )
            .into_response()
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parse `bytes {start}-{end}/{total}`.
fn parse_content_range(value: &str) -> Option<(u64, u64, u64)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}
