use serde::{Deserialize, Serialize};

use super::metrics::ClassificationReport;

/// `summary.json`。ダッシュボードの KPI に使う要約値。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub accuracy: f64,
}

impl From<&ClassificationReport> for EvaluationSummary {
    fn from(report: &ClassificationReport) -> Self {
        Self {
            macro_f1: report.macro_avg.f1_score,
            weighted_f1: report.weighted_avg.f1_score,
            accuracy: report.accuracy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reduces_report_averages() {
        let report =
            ClassificationReport::from_predictions(&["a", "a", "b"], &["a", "b", "b"]).expect("report");

        let summary = EvaluationSummary::from(&report);

        assert!((summary.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert!((summary.macro_f1 - report.macro_avg.f1_score).abs() < 1e-12);
        assert!((summary.weighted_f1 - report.weighted_avg.f1_score).abs() < 1e-12);
    }
}
