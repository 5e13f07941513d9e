//! Analysis engines and their shared result model.

pub mod gateway;
pub mod heuristic;
pub mod result;

pub use gateway::{normalize_response, AnalysisGateway, GatewayRequest, HttpGateway};
pub use heuristic::{template_suggestion, HeuristicEngine};
pub use result::{
    ActionSuggestion, AgentMetric, AnalysisResult, EngineKind, Intention, MetricValue, Sentiment,
    SentimentLabel, Snippet, MAX_KEYWORDS, MAX_SNIPPETS,
};
