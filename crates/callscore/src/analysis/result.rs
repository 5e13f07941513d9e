use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse purchase-intent bucket derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intention {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Intention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intention::High => write!(f, "high"),
            Intention::Medium => write!(f, "medium"),
            Intention::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Negative => write!(f, "negative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub confidence: f64,
}

impl Sentiment {
    pub const NEUTRAL_CONFIDENCE: f64 = 0.55;
    pub const POLAR_CONFIDENCE: f64 = 0.72;

    /// Sentiment with the fixed confidence for its label.
    pub fn from_label(label: SentimentLabel) -> Self {
        let confidence = match label {
            SentimentLabel::Neutral => Self::NEUTRAL_CONFIDENCE,
            _ => Self::POLAR_CONFIDENCE,
        };
        Self { label, confidence }
    }
}

/// Which engine produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Heuristic,
    Delegated,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Heuristic => write!(f, "heuristic"),
            EngineKind::Delegated => write!(f, "delegated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One labelled fact shown alongside the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetric {
    pub key: String,
    pub label_zh: String,
    pub label_en: String,
    pub value: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_zh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_en: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSuggestion {
    pub id: String,
    pub priority: Intention,
    pub title_zh: String,
    pub title_en: String,
    pub details_zh: String,
    pub details_en: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    /// Offset into the recording, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<f64>,
}

/// Structured output of either analysis path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub score: u8,
    pub intention: Intention,
    pub sentiment: Sentiment,
    pub keywords_top: Vec<String>,
    pub purchase_signals_count: u32,
    pub metrics: Vec<AgentMetric>,
    pub suggestions: Vec<ActionSuggestion>,
    pub extracted_snippets: Vec<Snippet>,
    /// Wall-clock time the analysis concluded.
    #[serde(rename = "finishedAtISO")]
    pub finished_at: DateTime<Utc>,
    pub engine: EngineKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_meta: Option<serde_json::Value>,
}

pub const MAX_KEYWORDS: usize = 5;
pub const MAX_SNIPPETS: usize = 6;
