use axum::{Json, extract::State};

use crate::app::AppState;
use crate::dashboard::{EntityShare, InsightsView, Kpis, RadarMetric, Sourced, TrendPoint};

/// リクエスト数とフォールバック応答数を記録して値を取り出す。
fn observe<T>(state: &AppState, route: &str, value: Sourced<T>) -> T {
    let metrics = state.telemetry().metrics();
    metrics.api_requests.with_label_values(&[route]).inc();
    if value.is_fallback() {
        metrics.fallback_served.with_label_values(&[route]).inc();
    }
    value.into_inner()
}

pub(crate) async fn kpis(State(state): State<AppState>) -> Json<Kpis> {
    let kpis = state.dashboard().kpis();
    Json(observe(&state, "kpis", kpis))
}

pub(crate) async fn entity_distribution(State(state): State<AppState>) -> Json<Vec<EntityShare>> {
    let shares = state.dashboard().entity_distribution();
    Json(observe(&state, "entity_distribution", shares))
}

pub(crate) async fn radar_metrics(State(state): State<AppState>) -> Json<Vec<RadarMetric>> {
    let radar = state.dashboard().radar_metrics();
    Json(observe(&state, "radar_metrics", radar))
}

pub(crate) async fn trend_series(State(state): State<AppState>) -> Json<Vec<TrendPoint>> {
    let series = Sourced::Fallback(state.dashboard().trend_series());
    Json(observe(&state, "trend_series", series))
}

pub(crate) async fn insights(State(state): State<AppState>) -> Json<InsightsView> {
    let insights = state.dashboard().insights();
    Json(observe(&state, "insights", insights))
}
