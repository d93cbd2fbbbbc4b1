//! # ヘルスチェックハンドラ
//!
//! `/system/health` はサービスとデータベースの状態を集約して返す。
//!
//! | 全体ステータス | HTTP ステータス |
//! |----------------|-----------------|
//! | `healthy` / `degraded` | 200 |
//! | `unhealthy` | 503 |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use kiln_shared::health::HealthReport;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub report:    HealthReport,
    pub timestamp: DateTime<Utc>,
    pub version:   String,
    pub uptime:    &'static str,
}

#[tracing::instrument(skip_all)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.container.health_snapshot(&state.registry).await;
    let status = if report.is_unhealthy() {
        tracing::warn!(status = ?report.status, "ヘルスチェックで必須コンポーネントの異常を検出しました");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(HealthResponse {
            report,
            timestamp: Utc::now(),
            version: state.settings.app_version.clone(),
            uptime: "running",
        }),
    )
}
