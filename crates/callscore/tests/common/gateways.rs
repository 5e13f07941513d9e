//! Fake analysis gateways.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use callscore::analysis::{normalize_response, AnalysisGateway, AnalysisResult, GatewayRequest};
use callscore::config::{GatewaySettings, Thresholds};
use callscore::GatewayError;

/// In-process gateway that waits, then answers with a fixed score or fails.
pub struct ScriptedGateway {
    delay: Duration,
    score: u8,
    fail: bool,
    pub calls: AtomicUsize,
    current: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(delay: Duration, score: u8) -> Self {
        Self {
            delay,
            score,
            fail: false,
            calls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    pub fn failing(delay: Duration) -> Self {
        Self {
            fail: true,
            ..Self::new(delay, 0)
        }
    }

    pub fn in_flight(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

struct Active<'a>(&'a AtomicUsize);

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisGateway for ScriptedGateway {
    async fn analyze(
        &self,
        _request: &GatewayRequest,
        _gateway: &GatewaySettings,
        thresholds: &Thresholds,
    ) -> Result<AnalysisResult, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        let _active = Active(&self.current);

        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(GatewayError::Status(503));
        }
        normalize_response(
            json!({"score": self.score, "finishedAtISO": Utc::now().to_rfc3339()}),
            thresholds,
        )
    }
}

/// What the HTTP fake saw in its last request.
#[derive(Clone, Default)]
pub struct Captured {
    pub authorization: Arc<Mutex<Option<String>>>,
    pub body: Arc<Mutex<Option<Value>>>,
}

#[derive(Clone)]
struct FakeState {
    captured: Captured,
    status: StatusCode,
    response: Value,
    delay: Duration,
}

async fn analyze_handler(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    *state.captured.authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.captured.body.lock().unwrap() = Some(body);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.response))
}

/// Serves `response` with `status` on `POST /analyze`; returns the URL.
pub async fn spawn_gateway(status: StatusCode, response: Value, captured: Captured) -> String {
    spawn_gateway_with_delay(status, response, captured, Duration::ZERO).await
}

pub async fn spawn_gateway_with_delay(
    status: StatusCode,
    response: Value,
    captured: Captured,
    delay: Duration,
) -> String {
    let state = FakeState {
        captured,
        status,
        response,
        delay,
    };
    let app = Router::new()
        .route("/analyze", post(analyze_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake gateway");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake gateway crashed");
    });

    format!("http://{}/analyze", addr)
}
