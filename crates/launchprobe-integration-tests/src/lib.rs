//! End-to-end test support for LaunchProbe
//!
//! [`FakeBinder`] is a small axum server that plays the build/launch service. Unlike
//! a canned mock response it writes the build stream chunk by chunk with real pauses,
//! so the probe sees the body arrive the way a long build delivers it.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Session path served by the fake
pub const SESSION_PATH: &str = "/session/abc";

/// Token the fake session API accepts
pub const SESSION_TOKEN: &str = "fake-token";

/// One step of the scripted build stream
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Write a raw line
    Line(String),
    /// Write `data: {"phase": ...}`
    Phase(&'static str),
    /// Sleep before the next step
    Pause(Duration),
    /// Write the ready event pointing at this server's session, with the given token
    Ready { token: String },
    /// Keep the connection open without writing anything more
    HoldOpen,
}

impl ScriptStep {
    pub fn ready() -> Self {
        ScriptStep::Ready {
            token: SESSION_TOKEN.to_string(),
        }
    }
}

#[derive(Clone)]
struct FakeBinderState {
    base_url: String,
    script: Arc<Vec<ScriptStep>>,
    health_checks: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

/// Running fake build/launch service
pub struct FakeBinder {
    pub base_url: String,
    health_checks: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl FakeBinder {
    /// Start serving `script` on every build request
    pub async fn start(script: Vec<ScriptStep>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://127.0.0.1:{}", addr.port());

        let state = FakeBinderState {
            base_url: base_url.clone(),
            script: Arc::new(script),
            health_checks: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        };
        let health_checks = state.health_checks.clone();
        let shutdowns = state.shutdowns.clone();

        let app = Router::new()
            .route("/build/gh/{*spec}", get(handle_build))
            .route("/session/abc/api", get(handle_api))
            .route("/session/abc/api/shutdown", post(handle_shutdown))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            health_checks,
            shutdowns,
        }
    }

    pub fn session_url(&self) -> String {
        format!("{}{}", self.base_url, SESSION_PATH)
    }

    /// Authorized `GET /api` calls served
    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Authorized shutdown calls served
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

async fn handle_build(State(state): State<FakeBinderState>) -> Response {
    let session_url = format!("{}{}", state.base_url, SESSION_PATH);
    let steps: Vec<ScriptStep> = state.script.iter().cloned().collect();

    let chunks = futures::stream::iter(steps)
        .then(move |step| {
            let session_url = session_url.clone();
            async move {
                match step {
                    ScriptStep::Line(line) => Some(format!("{}\n", line)),
                    ScriptStep::Phase(phase) => Some(format!(
                        "data: {}\n\n",
                        serde_json::json!({"phase": phase, "message": format!("{}...\n", phase)})
                    )),
                    ScriptStep::Pause(duration) => {
                        tokio::time::sleep(duration).await;
                        None
                    }
                    ScriptStep::Ready { token } => Some(format!(
                        "data: {}\n\n",
                        serde_json::json!({
                            "phase": "ready",
                            "message": "server running\n",
                            "url": session_url,
                            "token": token,
                        })
                    )),
                    ScriptStep::HoldOpen => {
                        std::future::pending::<()>().await;
                        None
                    }
                }
            }
        })
        .filter_map(|chunk| async move { chunk.map(|c| Ok::<_, std::io::Error>(Bytes::from(c))) });

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(chunks),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("token {}", SESSION_TOKEN);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

async fn handle_api(State(state): State<FakeBinderState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, "bad token").into_response();
    }
    state.health_checks.fetch_add(1, Ordering::SeqCst);
    axum::Json(serde_json::json!({"version": "7.0.0"})).into_response()
}

async fn handle_shutdown(State(state): State<FakeBinderState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, "bad token").into_response();
    }
    state.shutdowns.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK.into_response()
}

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("launchprobe_egress=debug,reqwest=warn")
        .with_test_writer()
        .try_init();
}
