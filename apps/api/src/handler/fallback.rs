//! # フォールバックハンドラ
//!
//! 未定義のルート・メソッドにも Problem Details 形式で応答する。

use axum::{
    Json,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use kiln_shared::error_response::ErrorResponse;

use crate::{error::ApiError, middleware::current_request_id};

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("{} は存在しません", uri.path()))
}

pub async fn method_not_allowed() -> Response {
    let body = ErrorResponse::method_not_allowed("このメソッドは許可されていません")
        .with_request_id(current_request_id());
    (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response()
}
