/// Prometheusメトリクス定義。
use prometheus::{
    Counter, HistogramVec, IntCounterVec, Registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub pages_fetched: Counter,
    pub fetch_retries: Counter,
    pub records_kept: Counter,
    pub records_dropped: Counter,
    pub training_runs: Counter,
    pub api_requests: IntCounterVec,
    pub fallback_served: IntCounterVec,

    // ヒストグラム
    pub stage_duration: HistogramVec,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既にレジストリに存在する場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            pages_fetched: register_counter_with_registry!(
                "radar_pages_fetched_total",
                "Total number of feed pages fetched from the upstream API",
                registry
            )?,
            fetch_retries: register_counter_with_registry!(
                "radar_fetch_retries_total",
                "Total number of retried upstream requests",
                registry
            )?,
            records_kept: register_counter_with_registry!(
                "radar_records_kept_total",
                "Total number of paper records written by preprocessing",
                registry
            )?,
            records_dropped: register_counter_with_registry!(
                "radar_records_dropped_total",
                "Total number of paper records dropped for rare labels",
                registry
            )?,
            training_runs: register_counter_with_registry!(
                "radar_training_runs_total",
                "Total number of completed classifier training runs",
                registry
            )?,
            api_requests: register_int_counter_vec_with_registry!(
                "radar_api_requests_total",
                "Analytics API requests per route",
                &["route"],
                registry
            )?,
            fallback_served: register_int_counter_vec_with_registry!(
                "radar_fallback_served_total",
                "Responses served from built-in fallback values",
                &["endpoint"],
                registry
            )?,
            stage_duration: register_histogram_vec_with_registry!(
                "radar_stage_duration_seconds",
                "Duration of pipeline stages",
                &["stage"],
                registry
            )?,
        })
    }
}
