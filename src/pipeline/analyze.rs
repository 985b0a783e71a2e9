use anyhow::Result;
use tracing::{info, instrument};

pub use crate::analysis::AnalysisParams as AnalyzeParams;
use crate::analysis::DataInsights;
use crate::observability::Metrics;
use crate::schema::paper::PaperRecord;
use crate::store::{ArtifactLayout, artifacts};

/// `papers.jsonl` を集計して `artifacts/data_insights.json` を書き出す。
///
/// # Errors
/// 入力が無い場合は [`crate::error::PipelineError::MissingInput`] を返す。
#[instrument(skip_all, fields(top_terms = params.top_terms, max_per_label = params.max_per_label))]
pub fn run(layout: &ArtifactLayout, params: &AnalyzeParams, metrics: &Metrics) -> Result<DataInsights> {
    let _timer = metrics
        .stage_duration
        .with_label_values(&["analyze"])
        .start_timer();

    let records: Vec<PaperRecord> =
        artifacts::read_jsonl(&layout.papers(), "Run preprocessing first.")?;
    let insights = DataInsights::from_records(&records, params);
    artifacts::write_json(&layout.insights(), &insights)?;

    info!(
        total_records = insights.total_records,
        unique_labels = insights.unique_labels,
        "dataset insights written"
    );
    Ok(insights)
}
