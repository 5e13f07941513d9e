//! Client for an external analysis gateway.
//!
//! The gateway receives the transcript as JSON and answers with a result in
//! the [`AnalysisResult`] shape. Only `score` and `finishedAtISO` are
//! required; everything else is normalised before it reaches a job.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::analysis::heuristic::template_suggestion;
use crate::analysis::result::{
    ActionSuggestion, AgentMetric, AnalysisResult, EngineKind, Intention, Sentiment,
    SentimentLabel, Snippet, MAX_KEYWORDS, MAX_SNIPPETS,
};
use crate::config::{GatewaySettings, Thresholds};
use crate::error::GatewayError;

/// Maximum length of a response body quoted in an error.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Body posted to the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    pub transcript_text: String,
    pub file_name: String,
    #[serde(rename = "createdAtISO")]
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    async fn analyze(
        &self,
        request: &GatewayRequest,
        gateway: &GatewaySettings,
        thresholds: &Thresholds,
    ) -> Result<AnalysisResult, GatewayError>;
}

/// Gateway reached over HTTP with `reqwest`.
#[derive(Clone, Default)]
pub struct HttpGateway {
    client: Client,
}

impl HttpGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnalysisGateway for HttpGateway {
    async fn analyze(
        &self,
        request: &GatewayRequest,
        gateway: &GatewaySettings,
        thresholds: &Thresholds,
    ) -> Result<AnalysisResult, GatewayError> {
        if !gateway.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let mut builder = self
            .client
            .post(gateway.url.trim())
            .timeout(Duration::from_secs(gateway.timeout_secs.max(1)))
            .json(request);

        if !gateway.auth_header.trim().is_empty() {
            builder = builder.header(reqwest::header::AUTHORIZATION, gateway.auth_header.trim());
        }

        log::debug!("Posting transcript for '{}' to gateway", request.file_name);
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!(
                "Gateway answered HTTP {}: {}",
                status.as_u16(),
                truncate(&body, MAX_ERROR_BODY_LENGTH)
            );
            return Err(GatewayError::Status(status.as_u16()));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("body is not JSON: {}", e)))?;

        normalize_response(value, thresholds)
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.chars().count() > max {
        let cut: String = body.chars().take(max).collect();
        format!("{}... (truncated)", cut)
    } else {
        body.to_string()
    }
}

/// Optional part of a gateway answer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayPayload {
    #[serde(default)]
    intention: Option<Intention>,
    #[serde(default)]
    sentiment: Option<Sentiment>,
    #[serde(default)]
    keywords_top: Option<Vec<String>>,
    #[serde(default)]
    purchase_signals_count: Option<u32>,
    #[serde(default)]
    metrics: Option<Vec<AgentMetric>>,
    #[serde(default)]
    suggestions: Option<Vec<ActionSuggestion>>,
    #[serde(default)]
    extracted_snippets: Option<Vec<Snippet>>,
    #[serde(default)]
    engine_meta: Option<serde_json::Value>,
}

/// Validates a raw gateway answer and fills in everything it left out.
pub fn normalize_response(
    value: serde_json::Value,
    thresholds: &Thresholds,
) -> Result<AnalysisResult, GatewayError> {
    if !value.is_object() {
        return Err(GatewayError::InvalidResponse(
            "expected a JSON object".to_string(),
        ));
    }

    let raw_score = value
        .get("score")
        .and_then(|s| s.as_f64())
        .filter(|s| s.is_finite())
        .ok_or_else(|| GatewayError::InvalidResponse("missing numeric score".to_string()))?;

    let finished_raw = value
        .get("finishedAtISO")
        .and_then(|f| f.as_str())
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| GatewayError::InvalidResponse("missing finishedAtISO".to_string()))?;

    let finished_at = DateTime::parse_from_rfc3339(finished_raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            GatewayError::InvalidResponse(format!("finishedAtISO '{}': {}", finished_raw, e))
        })?;

    let payload: GatewayPayload = serde_json::from_value(value)
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

    let score = raw_score.round().clamp(0.0, 100.0) as u8;
    let intention = payload
        .intention
        .unwrap_or_else(|| thresholds.intention_for(score));

    let mut suggestions = payload.suggestions.unwrap_or_default();
    if suggestions.is_empty() {
        suggestions.push(template_suggestion(intention));
    }

    let mut keywords_top = payload.keywords_top.unwrap_or_default();
    keywords_top.truncate(MAX_KEYWORDS);

    let mut extracted_snippets = payload.extracted_snippets.unwrap_or_default();
    extracted_snippets.truncate(MAX_SNIPPETS);

    Ok(AnalysisResult {
        score,
        intention,
        sentiment: payload
            .sentiment
            .unwrap_or_else(|| Sentiment::from_label(SentimentLabel::Neutral)),
        keywords_top,
        purchase_signals_count: payload.purchase_signals_count.unwrap_or(0),
        metrics: payload.metrics.unwrap_or_default(),
        suggestions,
        extracted_snippets,
        finished_at,
        engine: EngineKind::Delegated,
        engine_meta: payload.engine_meta,
    })
}
