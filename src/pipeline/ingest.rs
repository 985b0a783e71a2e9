use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, instrument};

use crate::clients::ArxivClient;
use crate::observability::Metrics;
use crate::schema::paper::IngestManifest;
use crate::store::{ArtifactLayout, artifacts};

/// 取得ステージのパラメータ。
#[derive(Debug, Clone, PartialEq)]
pub struct IngestParams {
    pub query: String,
    pub batches: usize,
    pub batch_size: usize,
    /// ページ間の待機時間。最終ページの後は待たない。
    pub sleep: Duration,
}

impl Default for IngestParams {
    fn default() -> Self {
        Self {
            query: "cat:cs.AI".to_string(),
            batches: 5,
            batch_size: 200,
            sleep: Duration::from_secs(2),
        }
    }
}

/// 1ページ分の生フィードを返す取得元。
pub trait PageSource {
    /// `start` から `max_results` 件のページ本文を返す。`on_retry` は再試行ごとに呼ばれる。
    fn fetch_page(
        &self,
        query: &str,
        start: usize,
        max_results: usize,
        on_retry: impl FnMut(),
    ) -> impl Future<Output = Result<String>>;
}

impl PageSource for ArxivClient {
    fn fetch_page(
        &self,
        query: &str,
        start: usize,
        max_results: usize,
        on_retry: impl FnMut(),
    ) -> impl Future<Output = Result<String>> {
        ArxivClient::fetch_page(self, query, start, max_results, on_retry)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub pages: Vec<PathBuf>,
    pub manifest: IngestManifest,
}

/// `batches` ページ分の Atom XML を取得し、`data/raw/` に保存する。
///
/// 1ページでも失敗した場合は中断する（それまでに保存したページは残る）。
///
/// # Errors
/// 取得または書き込みに失敗した場合はエラーを返す。
#[instrument(skip_all, fields(query = %params.query, batches = params.batches))]
pub async fn run<S: PageSource>(
    source: &S,
    layout: &ArtifactLayout,
    params: &IngestParams,
    metrics: &Metrics,
) -> Result<IngestOutcome> {
    let _timer = metrics
        .stage_duration
        .with_label_values(&["ingest"])
        .start_timer();

    let raw_dir = layout.raw_dir();
    tokio::fs::create_dir_all(&raw_dir)
        .await
        .with_context(|| format!("failed to create {}", raw_dir.display()))?;

    let mut pages = Vec::with_capacity(params.batches);
    for index in 0..params.batches {
        let start = index * params.batch_size;
        let body = source
            .fetch_page(&params.query, start, params.batch_size, || {
                metrics.fetch_retries.inc();
            })
            .await
            .with_context(|| format!("failed to fetch page {index} (start={start})"))?;

        let path = layout.raw_page(index);
        tokio::fs::write(&path, body.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        metrics.pages_fetched.inc();
        info!(page = index, start, bytes = body.len(), "saved feed page");
        pages.push(path);

        if index + 1 < params.batches && !params.sleep.is_zero() {
            tokio::time::sleep(params.sleep).await;
        }
    }

    let manifest = IngestManifest {
        batches: params.batches,
        query: params.query.clone(),
        batch_size: params.batch_size,
        fetched_at: Some(Utc::now()),
    };
    artifacts::write_json(&layout.manifest(), &manifest)?;
    info!(pages = pages.len(), "ingest finished");

    Ok(IngestOutcome { pages, manifest })
}
