pub(crate) mod analytics;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/analytics/kpis", get(analytics::kpis))
        .route(
            "/analytics/entity-distribution",
            get(analytics::entity_distribution),
        )
        .route("/analytics/radar-metrics", get(analytics::radar_metrics))
        .route("/analytics/trend-series", get(analytics::trend_series))
        .route("/analytics/insights", get(analytics::insights))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
