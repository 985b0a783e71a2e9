//! 分類結果の評価指標。

pub mod metrics;
pub mod summary;

pub use metrics::{ClassificationReport, LabelScores};
pub use summary::EvaluationSummary;
