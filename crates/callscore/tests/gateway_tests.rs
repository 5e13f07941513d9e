//! Delegated analysis over HTTP against an in-process axum gateway.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::json;

use common::{spawn_gateway, spawn_gateway_with_delay, Captured, TestHarness};

use callscore::analysis::{AnalysisGateway, EngineKind, GatewayRequest, HttpGateway, Intention};
use callscore::config::{GatewaySettings, Thresholds};
use callscore::messages::{FailureKind, Locale};
use callscore::queue::JobStatus;
use callscore::GatewayError;

const TRANSCRIPT: &str = "Please send the contract and the invoice.";

fn request() -> GatewayRequest {
    GatewayRequest {
        transcript_text: TRANSCRIPT.to_string(),
        file_name: "call.txt".to_string(),
        created_at: Utc::now(),
    }
}

fn settings_for(url: &str, auth_header: &str) -> GatewaySettings {
    GatewaySettings {
        url: url.to_string(),
        auth_header: auth_header.to_string(),
        timeout_secs: 5,
    }
}

fn valid_response() -> serde_json::Value {
    json!({
        "score": 88.2,
        "finishedAtISO": "2026-01-05T10:00:00Z",
        "keywordsTop": ["contract", "invoice"],
        "engineMeta": {"model": "intent-v2"}
    })
}

#[tokio::test]
async fn posts_transcript_with_auth_header() {
    let captured = Captured::default();
    let url = spawn_gateway(StatusCode::OK, valid_response(), captured.clone()).await;

    let result = HttpGateway::new()
        .analyze(
            &request(),
            &settings_for(&url, "Bearer secret"),
            &Thresholds::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.score, 88);
    assert_eq!(result.intention, Intention::High);
    assert_eq!(result.engine, EngineKind::Delegated);
    assert_eq!(result.engine_meta, Some(json!({"model": "intent-v2"})));
    assert_eq!(result.suggestions.len(), 1);

    assert_eq!(
        captured.authorization.lock().unwrap().as_deref(),
        Some("Bearer secret")
    );
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["transcriptText"], TRANSCRIPT);
    assert_eq!(body["fileName"], "call.txt");
    assert!(body["createdAtISO"].is_string());
}

#[tokio::test]
async fn omits_empty_auth_header() {
    let captured = Captured::default();
    let url = spawn_gateway(StatusCode::OK, valid_response(), captured.clone()).await;

    let client = reqwest::Client::builder()
        .user_agent("callscore-tests")
        .build()
        .unwrap();
    HttpGateway::with_client(client)
        .analyze(&request(), &settings_for(&url, "  "), &Thresholds::default())
        .await
        .unwrap();

    assert!(captured.authorization.lock().unwrap().is_none());
    assert!(captured.body.lock().unwrap().is_some());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let url = spawn_gateway(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "boom"}),
        Captured::default(),
    )
    .await;

    let err = HttpGateway::new()
        .analyze(&request(), &settings_for(&url, ""), &Thresholds::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Status(500)));
}

#[tokio::test]
async fn incomplete_response_is_rejected() {
    let url = spawn_gateway(
        StatusCode::OK,
        json!({"score": 70}),
        Captured::default(),
    )
    .await;

    let err = HttpGateway::new()
        .analyze(&request(), &settings_for(&url, ""), &Thresholds::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let url = spawn_gateway_with_delay(
        StatusCode::OK,
        valid_response(),
        Captured::default(),
        Duration::from_secs(3),
    )
    .await;

    let mut settings = settings_for(&url, "");
    settings.timeout_secs = 1;

    let err = HttpGateway::new()
        .analyze(&request(), &settings, &Thresholds::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn unreachable_gateway_is_transport_error() {
    // Bind and drop a listener to get a port nobody serves.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = HttpGateway::new()
        .analyze(
            &request(),
            &settings_for(&format!("http://{}/analyze", addr), ""),
            &Thresholds::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}

// ─── Through the pipeline ───────────────────────────────────────────────────

#[tokio::test]
async fn pipeline_records_gateway_result() {
    let url = spawn_gateway(StatusCode::OK, valid_response(), Captured::default()).await;
    let h = TestHarness::new();
    h.use_gateway(&url);

    let id = h.add_with_transcript("call.mp3", TRANSCRIPT);
    h.drain(Duration::from_secs(20)).await;

    let job = h.orchestrator.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Success, "error: {:?}", job.error);

    let analysis = job.analysis.unwrap();
    assert_eq!(analysis.engine, EngineKind::Delegated);
    assert_eq!(analysis.score, 88);
    assert_eq!(
        analysis.finished_at,
        DateTime::parse_from_rfc3339("2026-01-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    );
    assert_eq!(analysis.keywords_top, vec!["contract", "invoice"]);
}

#[tokio::test]
async fn pipeline_marks_gateway_failure() {
    let url = spawn_gateway(
        StatusCode::BAD_GATEWAY,
        json!({}),
        Captured::default(),
    )
    .await;
    let h = TestHarness::new();
    h.use_gateway(&url);
    h.update_settings(|s| s.locale = Locale::En);

    let id = h.add_with_transcript("call.mp3", TRANSCRIPT);
    h.drain(Duration::from_secs(20)).await;

    let job = h.orchestrator.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(FailureKind::AnalysisFailed));
    assert_eq!(
        job.error.as_deref(),
        Some(FailureKind::AnalysisFailed.message(Locale::En, 100).as_str())
    );
    assert!(job.analysis.is_none());
}

#[tokio::test]
async fn pipeline_rejects_response_without_timestamp() {
    let url = spawn_gateway(
        StatusCode::OK,
        json!({"score": 91, "intention": "high"}),
        Captured::default(),
    )
    .await;
    let h = TestHarness::new();
    h.use_gateway(&url);

    let id = h.add_with_transcript("call.mp3", TRANSCRIPT);
    h.drain(Duration::from_secs(20)).await;

    let job = h.orchestrator.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(FailureKind::AnalysisFailed));
}

#[tokio::test]
async fn pipeline_sends_trimmed_transcript() {
    let captured = Captured::default();
    let url = spawn_gateway(StatusCode::OK, valid_response(), captured.clone()).await;
    let h = TestHarness::new();
    h.use_gateway(&url);

    let id = h.add_with_transcript("call.mp3", "   hello contract  \n\n");
    h.drain(Duration::from_secs(20)).await;

    assert_eq!(h.status(&id), JobStatus::Success);
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["transcriptText"], "hello contract");
}
