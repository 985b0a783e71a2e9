//! データセットの語彙・ラベル統計。
//!
//! `data_insights.json` を生成し、ダッシュボードの insights に供給する。

pub(crate) mod stop_words;

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::paper::PaperRecord;

use self::stop_words::is_stop_word;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z][a-zA-Z0-9_+-]{2,}").expect("compile token pattern"));

/// 小文字化してトークンを抽出し、ストップワードを除く。
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// 出現順を保持するカウンタ。同数の場合は先に現れた要素を優先する。
#[derive(Debug, Clone, Default)]
pub struct TermCounter {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl TermCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        if let Some(&slot) = self.index.get(key) {
            self.entries[slot].1 += 1;
        } else {
            self.index.insert(key.to_string(), self.entries.len());
            self.entries.push((key.to_string(), 1));
        }
    }

    pub fn extend<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.add(key);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> usize {
        self.index.get(key).map_or(0, |&slot| self.entries[slot].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// 件数の多い順に最大 `n` 件。
    #[must_use]
    pub fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        let mut sorted = self.entries.clone();
        // stable sort keeps first-occurrence order among ties
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisParams {
    pub top_terms: usize,
    /// ラベルごとに語彙集計へ寄与するサンプル数の上限。
    pub max_per_label: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            top_terms: 12,
            max_per_label: 2000,
        }
    }
}

/// `data_insights.json` の内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInsights {
    pub total_records: usize,
    pub unique_labels: usize,
    /// `[label, count]` の組。
    pub top_labels: Vec<(String, usize)>,
    pub top_terms_global: Vec<String>,
    pub top_terms_by_label: BTreeMap<String, Vec<String>>,
}

impl DataInsights {
    /// レコード列から統計を集計する。
    #[must_use]
    pub fn from_records(records: &[PaperRecord], params: &AnalysisParams) -> Self {
        let mut label_counts = TermCounter::new();
        let mut global_terms = TermCounter::new();
        let mut label_terms: BTreeMap<String, TermCounter> = BTreeMap::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for record in records {
            label_counts.add(&record.label);
            let seen_for_label = seen.entry(record.label.as_str()).or_default();
            if *seen_for_label >= params.max_per_label {
                continue;
            }
            *seen_for_label += 1;

            let tokens = tokenize(&record.text);
            global_terms.extend(tokens.iter().map(String::as_str));
            label_terms
                .entry(record.label.clone())
                .or_default()
                .extend(tokens.iter().map(String::as_str));
        }

        let top_terms = |counter: &TermCounter| {
            counter
                .most_common(params.top_terms)
                .into_iter()
                .map(|(term, _)| term)
                .collect::<Vec<_>>()
        };

        Self {
            total_records: label_counts.total(),
            unique_labels: label_counts.len(),
            top_labels: label_counts.most_common(10),
            top_terms_global: top_terms(&global_terms),
            top_terms_by_label: label_terms
                .iter()
                .map(|(label, counter)| (label.clone(), top_terms(counter)))
                .collect(),
        }
    }
}
