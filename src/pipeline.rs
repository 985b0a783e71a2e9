//! バッチパイプラインの各ステージ。
//!
//! ingest → preprocess → analyze → train → evaluate の順に実行され、
//! ステージ間はディスク上のアーティファクトだけで接続される。

pub mod analyze;
pub mod evaluate;
pub mod ingest;
pub mod predict;
pub mod preprocess;
pub mod split;
pub mod train;

pub use analyze::AnalyzeParams;
pub use ingest::{IngestOutcome, IngestParams, PageSource};
pub use preprocess::{PreprocessOutcome, PreprocessParams};
pub use split::{SplitIndices, train_test_split};
pub use train::{TrainOutcome, TrainParams};
