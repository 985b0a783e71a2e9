use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 前処理済みの1論文。`papers.jsonl` の1行に対応する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub text: String,
    pub label: String,
}

impl PaperRecord {
    #[must_use]
    pub fn new(title: &str, summary: &str, label: impl Into<String>) -> Self {
        Self {
            text: format!("{title}\n{summary}"),
            label: label.into(),
        }
    }
}

/// 取得バッチの記録。`data/raw/manifest.json`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestManifest {
    pub batches: usize,
    pub query: String,
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}
