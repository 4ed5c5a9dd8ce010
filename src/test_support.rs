//! In-process stand-in for the GitHub REST API used by the async tests.

use axum::extract::{Path, State};
use axum::http::header::{ACCEPT, AUTHORIZATION};
use axum::http::{HeaderMap, HeaderName, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::GitHubConfig;
use crate::github::GitHubClient;

pub const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostedComment {
    pub path: String,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    files: Mutex<Option<(StatusCode, String)>>,
    raw: Mutex<HashMap<String, (StatusCode, String)>>,
    comment_response: Mutex<Option<(StatusCode, String)>>,
    api_requests: Mutex<Vec<RecordedRequest>>,
    raw_requests: Mutex<Vec<RecordedRequest>>,
    posted: Mutex<Vec<PostedComment>>,
    delay: Mutex<Duration>,
}

pub struct MockGitHub {
    base_url: String,
    state: Arc<MockState>,
}

impl MockGitHub {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/repos/{owner}/{repo}/pulls/{number}/files", get(list_files))
            .route(
                "/repos/{owner}/{repo}/issues/{number}/comments",
                post(create_comment),
            )
            .route("/raw/{*path}", get(raw_file))
            .with_state(state.clone());

        let addr = serve_router(app).await;
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn raw_url(&self, path: &str) -> String {
        format!("{}/raw/{}", self.base_url, path)
    }

    pub fn set_files(&self, status: StatusCode, body: serde_json::Value) {
        self.set_files_raw(status, &body.to_string());
    }

    pub fn set_files_raw(&self, status: StatusCode, body: &str) {
        *self.state.files.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn set_raw(&self, path: &str, status: StatusCode, body: &str) {
        self.state
            .raw
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub fn set_comment_status(&self, status: StatusCode, body: &str) {
        *self.state.comment_response.lock().unwrap() = Some((status, body.to_string()));
    }

    /// Hold every files-list and raw-content response for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn api_requests(&self) -> Vec<RecordedRequest> {
        self.state.api_requests.lock().unwrap().clone()
    }

    pub fn raw_request_headers(&self) -> Vec<RecordedRequest> {
        self.state.raw_requests.lock().unwrap().clone()
    }

    /// Paths requested from the raw-content route, in order.
    pub fn raw_requests(&self) -> Vec<String> {
        self.state
            .raw_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path.trim_start_matches("/raw/").to_string())
            .collect()
    }

    pub fn posted_comments(&self) -> Vec<PostedComment> {
        self.state.posted.lock().unwrap().clone()
    }

    pub fn github_config(&self) -> GitHubConfig {
        GitHubConfig {
            token: Some(TEST_TOKEN.to_string()),
            api_base_url: self.base_url.clone(),
            ..GitHubConfig::default()
        }
    }

    pub fn client(&self) -> GitHubClient {
        GitHubClient::new(&self.github_config(), TEST_TOKEN).unwrap()
    }
}

/// Serve `app` on an ephemeral localhost port for the rest of the test.
pub async fn serve_router(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn stall(state: &MockState) {
    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn record(uri: &Uri, headers: &HeaderMap) -> RecordedRequest {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RecordedRequest {
        path: uri.path().to_string(),
        authorization: header(AUTHORIZATION),
        accept: header(ACCEPT),
    }
}

async fn list_files(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, String) {
    state.api_requests.lock().unwrap().push(record(&uri, &headers));
    stall(&state).await;
    state
        .files
        .lock()
        .unwrap()
        .clone()
        .unwrap_or((StatusCode::OK, "[]".to_string()))
}

async fn raw_file(
    State(state): State<Arc<MockState>>,
    Path(path): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, String) {
    state.raw_requests.lock().unwrap().push(record(&uri, &headers));
    stall(&state).await;
    state
        .raw
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, "404: Not Found".to_string()))
}

async fn create_comment(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    state.api_requests.lock().unwrap().push(record(&uri, &headers));
    state.posted.lock().unwrap().push(PostedComment {
        path: uri.path().to_string(),
        body: body["body"].as_str().unwrap_or_default().to_string(),
    });
    state
        .comment_response
        .lock()
        .unwrap()
        .clone()
        .unwrap_or((StatusCode::CREATED, "{}".to_string()))
}
