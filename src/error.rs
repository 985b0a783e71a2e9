use std::path::PathBuf;

use thiserror::Error;

/// パイプライン各ステージのドメインエラー。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing {path}. {hint}")]
    MissingInput { path: PathBuf, hint: &'static str },

    #[error("{0}")]
    EmptyDataset(String),

    #[error("malformed feed {path}: {reason}")]
    MalformedFeed { path: PathBuf, reason: String },

    #[error("invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("upstream returned error status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
}

impl PipelineError {
    pub(crate) fn missing(path: impl Into<PathBuf>, hint: &'static str) -> Self {
        Self::MissingInput {
            path: path.into(),
            hint,
        }
    }
}
