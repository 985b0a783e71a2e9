//! Ingest against a mocked feed API.
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prometheus::Registry;
use research_radar::{
    clients::{ArxivClient, ArxivClientConfig},
    observability::Metrics,
    pipeline::{self, IngestParams, PageSource, PreprocessParams},
    schema::paper::IngestManifest,
    store::{ArtifactLayout, artifacts},
};
use tokio::time::Instant;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_FEED: &str = include_str!("data/arxiv_sample.xml");

fn client_for(server: &MockServer) -> ArxivClient {
    ArxivClient::new(ArxivClientConfig {
        base_url: format!("{}/api/query", server.uri()),
        connect_timeout: Duration::from_secs(2),
        total_timeout: Duration::from_secs(5),
        max_attempts: 3,
        backoff_base_ms: 1,
        backoff_cap_ms: 5,
    })
    .expect("client builds")
}

fn params(batches: usize) -> IngestParams {
    IngestParams {
        query: "cat:cs.AI".to_string(),
        batches,
        batch_size: 50,
        sleep: Duration::ZERO,
    }
}

#[tokio::test]
async fn ingest_writes_pages_and_manifest() {
    let server = MockServer::start().await;
    for (index, start) in ["0", "50", "100"].into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "cat:cs.AI"))
            .and(query_param("start", start))
            .and(query_param("max_results", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<feed>{index}</feed>")))
            .expect(1)
            .mount(&server)
            .await;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path().join("data"), dir.path().join("artifacts"));
    let metrics = Metrics::new(Arc::new(Registry::new())).expect("metrics");

    let outcome = pipeline::ingest::run(&client_for(&server), &layout, &params(3), &metrics)
        .await
        .expect("ingest succeeds");

    assert_eq!(outcome.pages, vec![layout.raw_page(0), layout.raw_page(1), layout.raw_page(2)]);
    assert_eq!(
        std::fs::read_to_string(layout.raw_page(2)).expect("page"),
        "<feed>2</feed>"
    );
    let manifest: IngestManifest = artifacts::read_json(&layout.manifest(), "").expect("manifest");
    assert_eq!(manifest.batches, 3);
    assert_eq!(manifest.batch_size, 50);
    assert_eq!(manifest.query, "cat:cs.AI");
    assert!(manifest.fetched_at.is_some());
    assert_eq!(metrics.pages_fetched.get(), 3.0);
}

#[tokio::test]
async fn ingest_aborts_on_failed_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_FEED))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("start", "50"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path().join("data"), dir.path().join("artifacts"));
    let metrics = Metrics::new(Arc::new(Registry::new())).expect("metrics");

    let result = pipeline::ingest::run(&client_for(&server), &layout, &params(3), &metrics).await;

    assert!(result.is_err());
    assert!(layout.raw_page(0).exists());
    assert!(!layout.manifest().exists());
}

#[tokio::test]
async fn ingested_pages_feed_preprocessing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_FEED))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path().join("data"), dir.path().join("artifacts"));
    let metrics = Metrics::new(Arc::new(Registry::new())).expect("metrics");

    pipeline::ingest::run(&client_for(&server), &layout, &params(2), &metrics)
        .await
        .expect("ingest succeeds");
    let outcome =
        pipeline::preprocess::run(&layout, &PreprocessParams::default(), &metrics).expect("preprocess");

    // the same page twice: every label doubles, including the formerly rare one
    assert_eq!(outcome.saved, 26);
    assert_eq!(outcome.dropped, 0);
    assert_eq!(outcome.label_stats["q-bio.NC"], 2);
}

/// Serves a fixed body and records when each page was requested.
#[derive(Default)]
struct RecordingSource {
    requested_at: Mutex<Vec<(usize, Instant)>>,
}

impl PageSource for RecordingSource {
    fn fetch_page(
        &self,
        _query: &str,
        start: usize,
        _max_results: usize,
        _on_retry: impl FnMut(),
    ) -> impl Future<Output = anyhow::Result<String>> {
        self.requested_at
            .lock()
            .expect("lock")
            .push((start, Instant::now()));
        async { Ok("<feed/>".to_string()) }
    }
}

#[tokio::test(start_paused = true)]
async fn ingest_sleeps_between_pages_but_not_after_the_last() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path().join("data"), dir.path().join("artifacts"));
    let metrics = Metrics::new(Arc::new(Registry::new())).expect("metrics");
    let source = RecordingSource::default();
    let params = IngestParams {
        sleep: Duration::from_secs(2),
        ..params(3)
    };

    let started = Instant::now();
    pipeline::ingest::run(&source, &layout, &params, &metrics)
        .await
        .expect("ingest succeeds");

    assert_eq!(started.elapsed(), Duration::from_secs(4));
    let requested = source.requested_at.lock().expect("lock").clone();
    let offsets: Vec<_> = requested
        .iter()
        .map(|(start, at)| (*start, at.duration_since(started)))
        .collect();
    assert_eq!(
        offsets,
        vec![
            (0, Duration::ZERO),
            (50, Duration::from_secs(2)),
            (100, Duration::from_secs(4)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn single_page_ingest_does_not_sleep() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path().join("data"), dir.path().join("artifacts"));
    let metrics = Metrics::new(Arc::new(Registry::new())).expect("metrics");
    let params = IngestParams {
        sleep: Duration::from_secs(30),
        ..params(1)
    };

    let started = Instant::now();
    pipeline::ingest::run(&RecordingSource::default(), &layout, &params, &metrics)
        .await
        .expect("ingest succeeds");

    assert_eq!(started.elapsed(), Duration::ZERO);
}
