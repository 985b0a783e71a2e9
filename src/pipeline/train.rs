use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::classification::{FitReport, LogisticRegressionParams, TextClassifier, TfidfConfig};
use crate::error::PipelineError;
use crate::evaluation::ClassificationReport;
use crate::observability::Metrics;
use crate::schema::paper::PaperRecord;
use crate::store::{ArtifactLayout, artifacts};

use super::split::train_test_split;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainParams {
    pub test_size: f64,
    pub seed: u64,
    pub tfidf: TfidfConfig,
    pub model: LogisticRegressionParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            tfidf: TfidfConfig::default(),
            model: LogisticRegressionParams::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub report: ClassificationReport,
    pub fit: FitReport,
    pub train_samples: usize,
    pub test_samples: usize,
    pub stratified: bool,
}

/// 分類器を学習し、評価セットでのレポートとモデルを書き出す。
///
/// # Errors
/// 入力が無い場合は [`PipelineError::MissingInput`]、空の場合は
/// [`PipelineError::EmptyDataset`] を返す。
#[instrument(skip_all, fields(test_size = params.test_size, seed = params.seed))]
pub fn run(layout: &ArtifactLayout, params: &TrainParams, metrics: &Metrics) -> Result<TrainOutcome> {
    let _timer = metrics
        .stage_duration
        .with_label_values(&["train"])
        .start_timer();

    let records: Vec<PaperRecord> =
        artifacts::read_jsonl(&layout.papers(), "Run preprocessing first.")?;
    if records.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "No samples found. Check preprocessing output.".to_string(),
        )
        .into());
    }

    let labels: Vec<String> = records.iter().map(|r| r.label.clone()).collect();
    let split = train_test_split(&labels, params.test_size, params.seed)?;
    let (train_texts, train_labels) = select(&records, &split.train);
    let (test_texts, test_labels) = select(&records, &split.test);
    info!(
        train = train_texts.len(),
        test = test_texts.len(),
        stratified = split.stratified,
        "dataset split"
    );

    let (classifier, fit) = TextClassifier::fit(&train_texts, &train_labels, params.tfidf, &params.model)?;
    let predictions = classifier.predict(&test_texts);
    let report = ClassificationReport::from_predictions(&test_labels, &predictions)
        .context("failed to build classification report")?;

    artifacts::write_json(&layout.report(), &report)?;
    classifier.save(&layout.model())?;
    metrics.training_runs.inc();
    info!(
        accuracy = report.accuracy,
        macro_f1 = report.macro_avg.f1_score,
        "training finished"
    );

    Ok(TrainOutcome {
        report,
        fit,
        train_samples: train_texts.len(),
        test_samples: test_texts.len(),
        stratified: split.stratified,
    })
}

fn select<'a>(records: &'a [PaperRecord], indices: &[usize]) -> (Vec<&'a str>, Vec<String>) {
    indices
        .iter()
        .map(|&i| (records[i].text.as_str(), records[i].label.clone()))
        .unzip()
}
