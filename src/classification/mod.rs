//! TF-IDF + ロジスティック回帰によるテキスト分類器。

pub mod features;
pub mod model;
pub mod tokenizer;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use features::{TfidfConfig, TfidfVectorizer};
pub use model::{ClassWeight, FitReport, LogisticRegression, LogisticRegressionParams};

use crate::store::artifacts;

/// 1件の予測結果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub probability: f64,
}

/// ベクトライザ・モデル・ラベル名をまとめた学習済み分類器。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextClassifier {
    labels: Vec<String>,
    vectorizer: TfidfVectorizer,
    model: LogisticRegression,
}

impl TextClassifier {
    /// テキストとラベルから学習する。ラベルはソートして ID を振る。
    ///
    /// # Errors
    /// 入力が空、長さ不一致、または語彙が作れない場合はエラーを返す。
    pub fn fit<S: AsRef<str> + Sync>(
        texts: &[S],
        labels: &[String],
        tfidf: TfidfConfig,
        params: &LogisticRegressionParams,
    ) -> Result<(Self, FitReport)> {
        ensure!(texts.len() == labels.len(), "texts/labels length mismatch");
        ensure!(!texts.is_empty(), "no training samples");

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let targets: Vec<usize> = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let vectorizer = TfidfVectorizer::fit(tfidf, texts).context("failed to fit TF-IDF vectorizer")?;
        let rows = vectorizer.transform_batch(texts);
        let (model, report) =
            LogisticRegression::fit(&rows, &targets, classes.len(), vectorizer.dim(), params)
                .context("failed to fit logistic regression")?;

        info!(
            samples = texts.len(),
            classes = classes.len(),
            features = vectorizer.dim(),
            iterations = report.iterations,
            converged = report.converged,
            "classifier trained"
        );

        Ok((
            Self {
                labels: classes,
                vectorizer,
                model,
            },
            report,
        ))
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    /// 各テキストの予測ラベル。
    #[must_use]
    pub fn predict<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<String> {
        self.vectorizer
            .transform_batch(texts)
            .iter()
            .map(|row| self.labels[self.model.predict(row)].clone())
            .collect()
    }

    /// 各テキストのクラス確率（`labels()` の順）。
    #[must_use]
    pub fn predict_proba<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Vec<f64>> {
        self.vectorizer
            .transform_batch(texts)
            .iter()
            .map(|row| self.model.predict_proba(row).to_vec())
            .collect()
    }

    /// 最も確率の高いラベルとその確率。
    #[must_use]
    pub fn predict_one(&self, text: &str) -> Prediction {
        let proba = self.model.predict_proba(&self.vectorizer.transform(text));
        let (index, probability) = proba
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (index, p)| {
                if p > best.1 { (index, p) } else { best }
            });
        Prediction {
            label: self.labels[index].clone(),
            probability,
        }
    }

    /// JSON として保存する。
    ///
    /// # Errors
    /// 書き込みに失敗した場合はエラーを返す。
    pub fn save(&self, path: &Path) -> Result<()> {
        artifacts::write_json(path, self)
    }

    /// JSON から読み込み、形状を検証する。
    ///
    /// # Errors
    /// ファイルが無い場合は [`crate::error::PipelineError::MissingInput`]、
    /// 形状が不整合な場合はエラーを返す。
    pub fn load(path: &Path) -> Result<Self> {
        let classifier: Self = artifacts::read_json(path, "Train first.")?;
        classifier
            .validate()
            .with_context(|| format!("invalid model artifact {}", path.display()))?;
        Ok(classifier)
    }

    fn validate(&self) -> Result<()> {
        self.model.validate()?;
        ensure!(!self.labels.is_empty(), "model has no labels");
        ensure!(
            self.model.n_classes() == self.labels.len(),
            "class count mismatch: {} weights rows for {} labels",
            self.model.n_classes(),
            self.labels.len()
        );
        ensure!(
            self.model.n_features() == self.vectorizer.dim(),
            "feature count mismatch: {} weight columns for {} vocabulary terms",
            self.model.n_features(),
            self.vectorizer.dim()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> (Vec<String>, Vec<String>) {
        let samples = [
            ("graph neural networks for molecules", "cs.LG"),
            ("deep networks and gradient training", "cs.LG"),
            ("stochastic gradient training of networks", "cs.LG"),
            ("robot arm grasping in clutter", "cs.RO"),
            ("legged robot locomotion control", "cs.RO"),
            ("robot navigation with lidar", "cs.RO"),
        ];
        samples
            .iter()
            .map(|(text, label)| ((*text).to_string(), (*label).to_string()))
            .unzip()
    }

    fn trained() -> TextClassifier {
        let (texts, labels) = corpus();
        let params = LogisticRegressionParams {
            c: 10.0,
            ..LogisticRegressionParams::default()
        };
        TextClassifier::fit(&texts, &labels, TfidfConfig::default(), &params)
            .expect("fit")
            .0
    }

    #[test]
    fn predicts_training_vocabulary() {
        let classifier = trained();

        assert_eq!(classifier.labels(), ["cs.LG", "cs.RO"]);
        assert_eq!(
            classifier.predict(&["robot grasping", "gradient training of networks"]),
            vec!["cs.RO", "cs.LG"]
        );
        let proba = classifier.predict_proba(&["robot"]);
        assert_eq!(proba[0].len(), 2);
        assert!(proba[0][1] > proba[0][0]);

        let prediction = classifier.predict_one("legged robot");
        assert_eq!(prediction.label, "cs.RO");
        assert!(prediction.probability > 0.5);
    }

    #[test]
    fn save_and_load_preserve_predictions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.json");
        let classifier = trained();

        classifier.save(&path).expect("save");
        let restored = TextClassifier::load(&path).expect("load");

        assert_eq!(restored.labels(), classifier.labels());
        assert_eq!(
            restored.predict(&["robot navigation"]),
            classifier.predict(&["robot navigation"])
        );
    }

    #[test]
    fn load_rejects_mismatched_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.json");
        let mut value = serde_json::to_value(trained()).expect("serialize");
        value["labels"] = serde_json::json!(["only-one"]);
        std::fs::write(&path, value.to_string()).expect("write");

        assert!(TextClassifier::load(&path).is_err());
    }
}
