use axum::{Json, extract::State};
use serde::Serialize;
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// アーティファクトが欠けていてもフォールバック値で応答できるため常に ready を返す。
pub(crate) async fn ready(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_ready_probe();

    let missing = state.dashboard().missing_artifacts();
    let detail = if missing.is_empty() {
        None
    } else {
        warn!(?missing, "serving fallback values for missing artifacts");
        Some(format!("fallback values served for: {}", missing.join(", ")))
    };

    Json(HealthReport {
        status: "ready",
        detail,
    })
}

pub(crate) async fn live(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_live_probe();
    Json(HealthReport {
        status: "live",
        detail: None,
    })
}
