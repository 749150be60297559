//! Fake clustering backend over HTTP
//!
//! Serves the backend's REST routes on an ephemeral local port and records
//! every request as `"METHOD /path?query"`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

#[derive(Default)]
struct ServerState {
    reference_row: i64,
    farthest: HashMap<u32, i64>,
    closest: HashMap<u32, i64>,
    labels: Vec<String>,
    cluster_ids: Vec<i64>,
    /// Canned (status, body) replacing the normal answer for a path
    overrides: HashMap<String, (u16, String)>,
    requests: Vec<String>,
    upload_had_file_field: bool,
}

type Shared = Arc<Mutex<ServerState>>;

#[derive(Deserialize)]
struct GraphQuery {
    graph_id: u32,
}

#[derive(Deserialize)]
struct ClusterQuery {
    cluster_no: u32,
}

/// Running fake backend; stops when dropped
pub struct FakeServer {
    url: String,
    state: Shared,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(ServerState::default()));

        let app = Router::new()
            .route("/upload", post(upload))
            .route("/getFarthestGraph", get(farthest))
            .route("/getClosestGraph", get(closest))
            .route("/furtherCluster", post(further_cluster))
            .route("/labelTrue", get(label_true))
            .route("/labelFalse", get(label_false))
            .route("/getLabelGraphId", get(final_labels))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend server");
        });

        Self {
            url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_reference_row(&self, row: i64) {
        self.state.lock().unwrap().reference_row = row;
    }

    pub fn set_farthest(&self, cluster: u32, value: i64) {
        self.state.lock().unwrap().farthest.insert(cluster, value);
    }

    pub fn set_closest(&self, cluster: u32, value: i64) {
        self.state.lock().unwrap().closest.insert(cluster, value);
    }

    pub fn set_final_labels(&self, labels: &[&str], cluster_ids: &[i64]) {
        let mut state = self.state.lock().unwrap();
        state.labels = labels.iter().map(|s| s.to_string()).collect();
        state.cluster_ids = cluster_ids.to_vec();
    }

    /// Answer every request to `path` with a fixed status and body
    pub fn override_path(&self, path: &str, status: u16, body: &str) {
        self.state
            .lock()
            .unwrap()
            .overrides
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn upload_had_file_field(&self) -> bool {
        self.state.lock().unwrap().upload_had_file_field
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Record the request; returns the override for its path, if any
fn record(state: &Shared, method: &str, uri: &Uri) -> Option<Response> {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("{} {}", method, uri));

    state.overrides.get(uri.path()).map(|(status, body)| {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, body.clone()).into_response()
    })
}

async fn upload(State(state): State<Shared>, uri: Uri, body: Bytes) -> Response {
    if let Some(response) = record(&state, "POST", &uri) {
        return response;
    }
    let mut state = state.lock().unwrap();
    let text = String::from_utf8_lossy(&body);
    state.upload_had_file_field = text.contains("name=\"file\"");
    Json(json!({ "expected_graph": state.reference_row })).into_response()
}

async fn farthest(State(state): State<Shared>, uri: Uri, Query(q): Query<GraphQuery>) -> Response {
    if let Some(response) = record(&state, "GET", &uri) {
        return response;
    }
    let value = state.lock().unwrap().farthest.get(&q.graph_id).copied().unwrap_or(-1);
    Json(json!({ "farthest_graph": value })).into_response()
}

async fn closest(State(state): State<Shared>, uri: Uri, Query(q): Query<GraphQuery>) -> Response {
    if let Some(response) = record(&state, "GET", &uri) {
        return response;
    }
    let value = state.lock().unwrap().closest.get(&q.graph_id).copied().unwrap_or(-1);
    Json(json!({ "closest_graph": value })).into_response()
}

async fn further_cluster(
    State(state): State<Shared>,
    uri: Uri,
    Query(_q): Query<ClusterQuery>,
) -> Response {
    if let Some(response) = record(&state, "POST", &uri) {
        return response;
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn label_true(State(state): State<Shared>, uri: Uri, Query(_q): Query<GraphQuery>) -> Response {
    if let Some(response) = record(&state, "GET", &uri) {
        return response;
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn label_false(State(state): State<Shared>, uri: Uri, Query(_q): Query<GraphQuery>) -> Response {
    if let Some(response) = record(&state, "GET", &uri) {
        return response;
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn final_labels(State(state): State<Shared>, uri: Uri) -> Response {
    if let Some(response) = record(&state, "GET", &uri) {
        return response;
    }
    let state = state.lock().unwrap();
    let body: Value = json!({ "labels": state.labels, "cluster_id": state.cluster_ids });
    Json(body).into_response()
}
