//! ステージ間で受け渡すファイル（アーティファクト）の配置と入出力。
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::config::Config;
use crate::error::PipelineError;

/// `data/` と `artifacts/` 以下のファイル配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    data_dir: PathBuf,
    artifacts_dir: PathBuf,
}

impl ArtifactLayout {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir(), config.artifacts_dir())
    }

    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    #[must_use]
    pub fn raw_page(&self, index: usize) -> PathBuf {
        self.raw_dir().join(format!("arxiv_{index}.xml"))
    }

    #[must_use]
    pub fn manifest(&self) -> PathBuf {
        self.raw_dir().join("manifest.json")
    }

    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    #[must_use]
    pub fn papers(&self) -> PathBuf {
        self.processed_dir().join("papers.jsonl")
    }

    #[must_use]
    pub fn label_stats(&self) -> PathBuf {
        self.processed_dir().join("label_stats.json")
    }

    #[must_use]
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    #[must_use]
    pub fn insights(&self) -> PathBuf {
        self.artifacts_dir.join("data_insights.json")
    }

    #[must_use]
    pub fn report(&self) -> PathBuf {
        self.artifacts_dir.join("report.json")
    }

    #[must_use]
    pub fn summary(&self) -> PathBuf {
        self.artifacts_dir.join("summary.json")
    }

    #[must_use]
    pub fn model(&self) -> PathBuf {
        self.artifacts_dir.join("model.json")
    }

    /// 外部のトランスフォーマー学習が出力するレポート。
    #[must_use]
    pub fn hf_report(&self) -> PathBuf {
        self.artifacts_dir.join("hf_report.json")
    }

    #[must_use]
    pub fn hf_summary(&self) -> PathBuf {
        self.artifacts_dir.join("hf_summary.json")
    }

    /// `data/raw/arxiv_*.xml` をファイル名順に列挙する。
    ///
    /// # Errors
    /// ディレクトリの読み取りに失敗した場合はエラーを返す。存在しない場合は空を返す。
    pub fn raw_pages(&self) -> Result<Vec<PathBuf>> {
        let dir = self.raw_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut pages = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
            let path = entry?.path();
            let is_page = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("arxiv_") && name.ends_with(".xml"));
            if is_page && path.is_file() {
                pages.push(path);
            }
        }
        pages.sort();
        Ok(pages)
    }
}

/// 2スペースインデントの JSON として書き出す。親ディレクトリは自動作成する。
///
/// # Errors
/// シリアライズまたは書き込みに失敗した場合はエラーを返す。
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value).context("failed to serialize artifact")?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

/// JSON を読み込む。存在しなければ `MissingInput` を返す。
///
/// # Errors
/// ファイルが無い、読めない、またはパースできない場合はエラーを返す。
pub fn read_json<T: DeserializeOwned>(path: &Path, hint: &'static str) -> Result<T> {
    if !path.exists() {
        return Err(PipelineError::missing(path, hint).into());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).map_err(|error| {
        PipelineError::InvalidArtifact {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
        .into()
    })
}

/// 読めない・壊れている JSON は `None` として扱う（配信層のフォールバック用）。
#[must_use]
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unparsable artifact");
            None
        }
    }
}

/// 1行1オブジェクトの JSONL を書き出す。
///
/// # Errors
/// 書き込みに失敗した場合はエラーを返す。
pub fn write_jsonl<'a, T, I>(path: &Path, records: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    ensure_parent(path)?;
    let file = fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;
    for record in records {
        serde_json::to_writer(&mut writer, record).context("failed to serialize record")?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// JSONL を読み込む。空行は無視する。
///
/// # Errors
/// ファイルが無い場合は `MissingInput`、行のパースに失敗した場合は `InvalidArtifact` を返す。
pub fn read_jsonl<T: DeserializeOwned>(path: &Path, hint: &'static str) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(PipelineError::missing(path, hint).into());
    }
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|error| PipelineError::InvalidArtifact {
            path: path.to_path_buf(),
            reason: format!("line {}: {error}", index + 1),
        })?;
        records.push(record);
    }
    Ok(records)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
