use anyhow::Result;
use tracing::{info, instrument};

use crate::evaluation::{ClassificationReport, EvaluationSummary};
use crate::observability::Metrics;
use crate::store::{ArtifactLayout, artifacts};

/// `report.json` を要約して `summary.json` を書き出す。
///
/// # Errors
/// レポートが無い場合は [`crate::error::PipelineError::MissingInput`] を返す。
#[instrument(skip_all)]
pub fn run(layout: &ArtifactLayout, metrics: &Metrics) -> Result<EvaluationSummary> {
    let _timer = metrics
        .stage_duration
        .with_label_values(&["evaluate"])
        .start_timer();

    let report: ClassificationReport = artifacts::read_json(&layout.report(), "Train first.")?;
    let summary = EvaluationSummary::from(&report);
    artifacts::write_json(&layout.summary(), &summary)?;

    info!(
        macro_f1 = summary.macro_f1,
        weighted_f1 = summary.weighted_f1,
        accuracy = summary.accuracy,
        "evaluation summary written"
    );
    Ok(summary)
}
