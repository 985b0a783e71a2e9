use anyhow::Result;

use crate::classification::{Prediction, TextClassifier};
use crate::store::ArtifactLayout;

/// 保存済みモデルで各テキストのラベルを予測する。
///
/// # Errors
/// モデルが無い場合は [`crate::error::PipelineError::MissingInput`] を返す。
pub fn run<S: AsRef<str>>(layout: &ArtifactLayout, texts: &[S]) -> Result<Vec<Prediction>> {
    let classifier = TextClassifier::load(&layout.model())?;
    Ok(texts
        .iter()
        .map(|text| classifier.predict_one(text.as_ref()))
        .collect())
}
