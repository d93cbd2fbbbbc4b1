//! # API 情報ハンドラ

use axum::{Json, extract::State};
use serde::Serialize;

use crate::{config::Environment, state::AppState};

/// `GET /` のレスポンス
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub name:        String,
    pub version:     String,
    pub environment: Environment,
    pub api_version: &'static str,
    /// 本番環境では常に `null`
    pub docs_url:    Option<String>,
    pub api_prefix:  String,
}

pub async fn api_info(State(state): State<AppState>) -> Json<ApiInfoResponse> {
    let settings = &state.settings;
    Json(ApiInfoResponse {
        name:        settings.app_name.clone(),
        version:     settings.app_version.clone(),
        environment: settings.environment,
        api_version: "v1",
        docs_url:    settings.public_docs_url().map(str::to_string),
        api_prefix:  settings.api_v1_prefix.clone(),
    })
}
