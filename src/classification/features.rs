//! 語 n-gram の TF-IDF 特徴量。
use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, ensure};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprs::CsVec;

use super::tokenizer::ngrams;

/// 語彙の上限などベクトライザの設定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfidfConfig {
    pub ngram_min: usize,
    pub ngram_max: usize,
    /// 全文書での出現回数が多い順に残す語彙数。`None` は無制限。
    pub max_features: Option<usize>,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            ngram_min: 1,
            ngram_max: 2,
            max_features: Some(50_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorizerState {
    config: TfidfConfig,
    vocabulary: Vec<String>,
    idf: Vec<f64>,
}

/// 学習済み TF-IDF ベクトライザ。
///
/// 特徴量のインデックスは語彙のアルファベット順。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "VectorizerState", into = "VectorizerState")]
pub struct TfidfVectorizer {
    config: TfidfConfig,
    vocabulary: Vec<String>,
    idf: Vec<f64>,
    index: HashMap<String, usize>,
}

impl TryFrom<VectorizerState> for TfidfVectorizer {
    type Error = anyhow::Error;

    fn try_from(state: VectorizerState) -> Result<Self> {
        ensure!(
            state.vocabulary.len() == state.idf.len(),
            "vocabulary/idf length mismatch: {} vs {}",
            state.vocabulary.len(),
            state.idf.len()
        );
        ensure!(
            state.vocabulary.windows(2).all(|pair| pair[0] < pair[1]),
            "vocabulary must be sorted and unique"
        );
        Ok(Self::from_parts(state.config, state.vocabulary, state.idf))
    }
}

impl From<TfidfVectorizer> for VectorizerState {
    fn from(vectorizer: TfidfVectorizer) -> Self {
        Self {
            config: vectorizer.config,
            vocabulary: vectorizer.vocabulary,
            idf: vectorizer.idf,
        }
    }
}

impl TfidfVectorizer {
    fn from_parts(config: TfidfConfig, vocabulary: Vec<String>, idf: Vec<f64>) -> Self {
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(position, term)| (term.clone(), position))
            .collect();
        Self {
            config,
            vocabulary,
            idf,
            index,
        }
    }

    /// 文書集合から語彙と idf を学習する。
    ///
    /// # Errors
    /// 文書が空、または語彙が1つも得られない場合はエラーを返す。
    pub fn fit<S: AsRef<str> + Sync>(config: TfidfConfig, documents: &[S]) -> Result<Self> {
        ensure!(!documents.is_empty(), "cannot fit vectorizer on an empty corpus");

        let per_doc: Vec<HashMap<String, usize>> = documents
            .par_iter()
            .map(|doc| count_terms(doc.as_ref(), &config))
            .collect();

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for counts in &per_doc {
            for (term, count) in counts {
                *term_freq.entry(term.as_str()).or_default() += count;
                *doc_freq.entry(term.as_str()).or_default() += 1;
            }
        }
        ensure!(
            !term_freq.is_empty(),
            "empty vocabulary; documents contain no usable terms"
        );

        let mut ranked: Vec<(&str, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if let Some(limit) = config.max_features {
            ranked.truncate(limit);
        }
        let mut vocabulary: Vec<String> = ranked.into_iter().map(|(term, _)| term.to_string()).collect();
        vocabulary.sort_unstable();

        let n = documents.len() as f64;
        let idf = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        Ok(Self::from_parts(config, vocabulary, idf))
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    #[must_use]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    #[must_use]
    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// 1文書を L2 正規化済みの疎ベクトルに変換する。未知語は無視する。
    #[must_use]
    pub fn transform(&self, document: &str) -> CsVec<f64> {
        let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
        for term in ngrams(document, self.config.ngram_min, self.config.ngram_max) {
            if let Some(&position) = self.index.get(&term) {
                *weights.entry(position).or_default() += 1.0;
            }
        }
        for (position, weight) in &mut weights {
            *weight *= self.idf[*position];
        }

        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        let (indices, data): (Vec<usize>, Vec<f64>) = weights
            .into_iter()
            .map(|(position, weight)| (position, if norm > 0.0 { weight / norm } else { weight }))
            .unzip();
        CsVec::new(self.dim(), indices, data)
    }

    /// 複数文書を並列に変換する。
    #[must_use]
    pub fn transform_batch<S: AsRef<str> + Sync>(&self, documents: &[S]) -> Vec<CsVec<f64>> {
        documents
            .par_iter()
            .map(|doc| self.transform(doc.as_ref()))
            .collect()
    }
}

fn count_terms(document: &str, config: &TfidfConfig) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for term in ngrams(document, config.ngram_min, config.ngram_max) {
        *counts.entry(term).or_default() += 1;
    }
    counts
}
