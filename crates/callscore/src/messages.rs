//! User-facing strings shown on failed or canceled jobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zh" => Ok(Locale::Zh),
            "en" => Ok(Locale::En),
            other => Err(format!("unknown locale '{}'", other)),
        }
    }
}

/// Why a job ended up in `failed` (or `canceled`). Stored next to the
/// rendered message so callers can branch without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    UnsupportedFormat,
    FileTooLarge,
    MissingTranscript,
    AnalysisFailed,
    Canceled,
}

impl FailureKind {
    /// Renders the message for this failure. `max_file_mb` is only used by
    /// [`FailureKind::FileTooLarge`].
    pub fn message(&self, locale: Locale, max_file_mb: u64) -> String {
        match (self, locale) {
            (FailureKind::UnsupportedFormat, Locale::Zh) => {
                "不支持的文件格式：请上传音频或文本文件（白名单可在设置中配置）。".to_string()
            }
            (FailureKind::UnsupportedFormat, Locale::En) => {
                "Unsupported file format: upload an audio or text file (the allowlist is configurable in settings).".to_string()
            }
            (FailureKind::FileTooLarge, Locale::Zh) => {
                format!("文件大小超出限制（最大 {}MB）", max_file_mb)
            }
            (FailureKind::FileTooLarge, Locale::En) => {
                format!("File exceeds the size limit (max {}MB)", max_file_mb)
            }
            (FailureKind::MissingTranscript, Locale::Zh) => {
                "缺少可分析文本：请粘贴或补充转写文本。".to_string()
            }
            (FailureKind::MissingTranscript, Locale::En) => {
                "No transcript to analyse: paste or attach the transcript text, then retry."
                    .to_string()
            }
            (FailureKind::AnalysisFailed, Locale::Zh) => {
                "分析失败：请重试或检查文件内容。".to_string()
            }
            (FailureKind::AnalysisFailed, Locale::En) => {
                "Analysis failed: retry or check the file contents.".to_string()
            }
            (FailureKind::Canceled, Locale::Zh) => "已取消".to_string(),
            (FailureKind::Canceled, Locale::En) => "Canceled".to_string(),
        }
    }
}
