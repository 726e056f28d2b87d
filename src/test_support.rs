// In-process mock of the robot's HTTP API for tests
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
}

pub struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    pub fail_commands: AtomicBool,
    pub sensor: Mutex<Value>,
    pub monitor: Mutex<Value>,
}

impl MockState {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    fn record(&self, path: &str, body: Value) {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: path.to_string(),
            body,
        });
    }
}

pub struct MockDevice {
    pub base_url: String,
    pub state: Arc<MockState>,
}

pub async fn spawn_mock_device() -> MockDevice {
    let state = Arc::new(MockState {
        requests: Mutex::new(Vec::new()),
        fail_commands: AtomicBool::new(false),
        sensor: Mutex::new(json!({
            "connected": true, "x": 0.25, "y": -0.5, "raw_x": 0.31, "raw_y": -0.47
        })),
        monitor: Mutex::new(json!({
            "kalman_x": {"value": 0.1234, "Q": 0.01},
            "kalman_y": {"value": -0.5, "Q": 0.02},
            "pid_error": 0.75,
            "stability": 88.88,
            "parameters": {"Q": 0.01, "P": 5.0}
        })),
    });

    let app = Router::new()
        .route("/hop", post(command))
        .route("/lights/brightness", post(command))
        .route("/lights/color", post(command))
        .route("/lights/pattern", post(command))
        .route("/hop/status", get(hop_status))
        .route("/param_update", get(param_update))
        .route("/monitor_data", get(monitor_data))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockDevice {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// A localhost URL nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn command(State(state): State<Arc<MockState>>, uri: Uri, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.record(uri.path(), body);
    if state.fail_commands.load(Ordering::SeqCst) {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false, "error": "actuator fault"})))
    } else {
        (StatusCode::OK, Json(json!({"success": true})))
    }
}

async fn hop_status(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.record("/hop/status", Value::Null);
    Json(state.sensor.lock().unwrap().clone())
}

async fn param_update(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let name = query.get("name").cloned().unwrap_or_default();
    let value = query.get("value").cloned().unwrap_or_default();
    state.record("/param_update", json!({"name": name, "value": value}));
    Json(json!({"success": true, "message": format!("Updated {}", name)}))
}

async fn monitor_data(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.record("/monitor_data", Value::Null);
    Json(state.monitor.lock().unwrap().clone())
}
