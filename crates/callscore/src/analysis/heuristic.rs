//! Keyword-based intent scoring.
//!
//! Counts which phrases from four fixed lists appear in a transcript and
//! turns the counts into a score, a sentiment label, keywords, a follow-up
//! suggestion and a few display metrics. No model, no network.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::analysis::result::{
    ActionSuggestion, AgentMetric, AnalysisResult, EngineKind, Intention, MetricValue, Sentiment,
    SentimentLabel, Snippet, MAX_KEYWORDS, MAX_SNIPPETS,
};
use crate::config::Settings;

/// Contract, payment, procurement and delivery talk.
const SIGNAL_PATTERNS: &[&str] = &[
    "合同",
    "签约",
    "付款",
    "发票",
    "采购",
    "走流程",
    "什么时候能",
    "交付",
    "上线",
    "部署",
    "试用",
    "po",
    "invoice",
    "purchase",
    "contract",
    "pay",
];

const PRICE_PATTERNS: &[&str] = &[
    "价格", "便宜", "折扣", "优惠", "预算", "报价", "多少钱", "price", "discount", "budget", "quote",
];

const NEGATIVE_PATTERNS: &[&str] = &[
    "太贵",
    "不行",
    "不考虑",
    "不需要",
    "不方便",
    "no",
    "not",
    "expensive",
    "concern",
    "issue",
];

const POSITIVE_PATTERNS: &[&str] = &[
    "可以",
    "没问题",
    "行",
    "好的",
    "愿意",
    "感兴趣",
    "ok",
    "sounds good",
    "interested",
    "great",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "in", "on", "is", "are", "i", "we", "you", "我",
    "你", "他", "她", "我们", "你们", "他们", "的", "了", "吗", "呢", "啊", "是", "在", "就", "都",
    "也", "还", "和", "与", "及", "以及",
];

const SNIPPET_TERMINATORS: &[char] = &['。', '.', '!', '?', '！', '？', '\n'];

/// Characters per minute of conversation, used for the duration estimate.
const CHARS_PER_MINUTE: f64 = 180.0;

/// Raw counts behind a heuristic score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub score: u8,
    pub signals: u32,
    pub price_hits: u32,
    pub negative_hits: u32,
    pub positive_hits: u32,
}

impl ScoreBreakdown {
    pub fn price_sensitive(&self) -> bool {
        self.price_hits > 0
    }

    pub fn sentiment_label(&self) -> SentimentLabel {
        let pos = self.positive_hits as i64;
        let neg = self.negative_hits as i64;
        if pos - neg >= 2 {
            SentimentLabel::Positive
        } else if neg - pos >= 2 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

fn count_present(haystack: &str, patterns: &[&str]) -> u32 {
    patterns.iter().filter(|p| haystack.contains(*p)).count() as u32
}

/// Scores `text` by keyword presence. Each pattern counts at most once.
pub fn score_text(text: &str) -> ScoreBreakdown {
    let lowered = text.to_lowercase();

    let signals = count_present(&lowered, SIGNAL_PATTERNS);
    let price_hits = count_present(&lowered, PRICE_PATTERNS);
    let negative_hits = count_present(&lowered, NEGATIVE_PATTERNS);
    let positive_hits = count_present(&lowered, POSITIVE_PATTERNS);

    let mut score = 40 + 18 * signals as i64 + 6 * positive_hits as i64 - 10 * negative_hits as i64;
    if price_hits > 0 {
        score += 4;
    }

    ScoreBreakdown {
        score: score.clamp(0, 100) as u8,
        signals,
        price_hits,
        negative_hits,
        positive_hits,
    }
}

fn punctuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\r\n]+|[\p{P}\p{S}]+").expect("static regex is valid"))
}

/// Most frequent non-stop-word tokens, ties in first-seen order.
pub fn top_keywords(text: &str) -> Vec<String> {
    let cleaned = punctuation_regex().replace_all(text, " ").to_lowercase();
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();

    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();

    for word in cleaned.split_whitespace() {
        if word.chars().count() < 2 || stop.contains(word) {
            continue;
        }
        let count = freq.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| freq[b].cmp(&freq[a]));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Splits after every sentence terminator and keeps the first few
/// non-empty pieces.
pub fn extract_snippets(text: &str) -> Vec<Snippet> {
    let mut snippets = Vec::new();
    let mut start = 0;

    let push = |segment: &str, snippets: &mut Vec<Snippet>| {
        let trimmed = segment.trim();
        if !trimmed.is_empty() && snippets.len() < MAX_SNIPPETS {
            snippets.push(Snippet {
                text: trimmed.to_string(),
                at: None,
            });
        }
    };

    for (idx, ch) in text.char_indices() {
        if SNIPPET_TERMINATORS.contains(&ch) {
            let end = idx + ch.len_utf8();
            push(&text[start..end], &mut snippets);
            start = end;
        }
    }
    push(&text[start..], &mut snippets);

    snippets
}

/// Conversation length guessed from the transcript size, in minutes.
pub fn estimate_minutes(text: &str) -> u64 {
    let minutes = (text.chars().count() as f64 / CHARS_PER_MINUTE).round() as u64;
    minutes.max(1)
}

/// The follow-up recommendation for an intention level.
pub fn template_suggestion(intention: Intention) -> ActionSuggestion {
    let (title_zh, title_en, details_zh, details_en) = match intention {
        Intention::High => (
            "锁定决策链路，24小时内推动下一步",
            "Lock decision path and push next step in 24h",
            "建议：确认预算/签约流程/交付时间表，并发出会议邀请或合同草案。",
            "Recommendation: confirm budget/procurement flow/delivery timeline, send meeting invite or draft contract.",
        ),
        Intention::Medium => (
            "补齐关键信息，制造下一次触达理由",
            "Fill info gaps and create a reason to follow up",
            "建议：针对顾虑点（如价格/竞品/落地）发送对比材料，并预约二次沟通。",
            "Recommendation: address concerns (price/competition/implementation) with materials and schedule a follow-up call.",
        ),
        Intention::Low => (
            "降低跟进成本，进入轻量培育",
            "Lower cost and nurture lightly",
            "建议：发送案例/白皮书，设置提醒在一周后再触达。",
            "Recommendation: send a case study/whitepaper and set a reminder to re-engage in a week.",
        ),
    };

    ActionSuggestion {
        id: uuid::Uuid::new_v4().to_string(),
        priority: intention,
        title_zh: title_zh.to_string(),
        title_en: title_en.to_string(),
        details_zh: details_zh.to_string(),
        details_en: details_en.to_string(),
    }
}

fn build_metrics(text: &str, breakdown: &ScoreBreakdown) -> Vec<AgentMetric> {
    vec![
        AgentMetric {
            key: "duration".to_string(),
            label_zh: "对话时长（估算）".to_string(),
            label_en: "Conversation length (est.)".to_string(),
            value: MetricValue::Text(format!("{} min", estimate_minutes(text))),
            help_zh: Some("按文本长度估算；可由音频时长或转写时间戳计算。".to_string()),
            help_en: Some(
                "Estimated from text length; audio duration or transcript timestamps are more accurate."
                    .to_string(),
            ),
        },
        AgentMetric {
            key: "signals".to_string(),
            label_zh: "购买信号次数".to_string(),
            label_en: "Purchase signals".to_string(),
            value: MetricValue::Number(breakdown.signals as f64),
            help_zh: Some("基于合同/采购/交付/试用等关键词匹配。".to_string()),
            help_en: Some("Based on keywords like contract/procurement/delivery/trial.".to_string()),
        },
        AgentMetric {
            key: "priceSensitivity".to_string(),
            label_zh: "价格敏感".to_string(),
            label_en: "Price sensitive".to_string(),
            value: MetricValue::Text(
                if breakdown.price_sensitive() { "Yes" } else { "No" }.to_string(),
            ),
            help_zh: Some("基于预算/报价/折扣等词匹配。".to_string()),
            help_en: Some("Based on budget/quote/discount keywords.".to_string()),
        },
    ]
}

/// The built-in analysis engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl HeuristicEngine {
    pub fn new() -> Self {
        Self
    }

    /// Analyses a non-empty transcript. Callers handle empty text.
    pub fn analyze(&self, text: &str, settings: &Settings) -> AnalysisResult {
        let breakdown = score_text(text);
        let intention = settings.thresholds.intention_for(breakdown.score);

        AnalysisResult {
            score: breakdown.score,
            intention,
            sentiment: Sentiment::from_label(breakdown.sentiment_label()),
            keywords_top: top_keywords(text),
            purchase_signals_count: breakdown.signals,
            metrics: build_metrics(text, &breakdown),
            suggestions: vec![template_suggestion(intention)],
            extracted_snippets: extract_snippets(text),
            finished_at: Utc::now(),
            engine: EngineKind::Heuristic,
            engine_meta: None,
        }
    }
}
