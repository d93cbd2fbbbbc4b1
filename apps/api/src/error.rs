//! # API エラーハンドリング
//!
//! ハンドラーが返すエラー型と、RFC 9457 Problem Details レスポンスへの変換。
//!
//! 変換はルーティング境界（[`IntoResponse`]）で一度だけ行う。
//! 500 系のエラーは詳細をサーバーログにのみ出力し、クライアントには固定文言を返す。

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use kiln_infra::InfraError;
use kiln_shared::error_response::ErrorResponse;
use thiserror::Error;

use crate::{container::ContainerError, middleware::current_request_id, service::ServiceError};

/// API エラー
#[derive(Debug, Error)]
pub enum ApiError {
    /// 設定の不備（起動後に検出されたもの）
    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        context: Option<serde_json::Value>,
    },

    /// 未登録のサービス・データベースの参照
    #[error("ルックアップエラー: {0}")]
    Lookup(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Configuration(_) | Self::Lookup(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn log(&self) {
        match self {
            Self::Configuration(_) => tracing::error!(
                error.category = "configuration",
                error.kind = "configuration",
                "{}",
                self
            ),
            Self::Lookup(_) => tracing::error!(
                error.category = "configuration",
                error.kind = "lookup",
                "{}",
                self
            ),
            Self::Internal(e) => tracing::error!(
                error.category = "infrastructure",
                error.kind = "internal",
                "内部エラー: {:?}",
                e
            ),
            _ => {}
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        match self {
            Self::NotFound(detail) => ErrorResponse::not_found(detail),
            Self::Validation { message, context } => {
                let body = ErrorResponse::validation_error(message);
                match context {
                    Some(context) => body.with_context(context.clone()),
                    None => body,
                }
            }
            Self::Unauthorized(detail) => ErrorResponse::unauthorized(detail),
            Self::Configuration(_) | Self::Lookup(_) | Self::Internal(_) => {
                ErrorResponse::internal_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = self
            .to_error_response()
            .with_request_id(current_request_id());
        let mut response = (self.status(), Json(body)).into_response();

        if matches!(self, Self::Unauthorized(_)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<InfraError> for ApiError {
    fn from(e: InfraError) -> Self {
        if e.is_lookup() {
            Self::Lookup(e.to_string())
        } else if e.is_configuration() {
            Self::Configuration(e.to_string())
        } else {
            Self::Internal(anyhow::Error::new(e))
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Configuration(msg) => Self::Configuration(msg),
            ServiceError::NotInitialized(_) => Self::Lookup(e.to_string()),
            ServiceError::NotFound(msg) => Self::NotFound(msg),
            ServiceError::Validation { message, context } => Self::Validation { message, context },
            ServiceError::Infra(e) => e.into(),
            ServiceError::Unexpected(msg) => Self::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<ContainerError> for ApiError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::NotRegistered(_)
            | ContainerError::NotReady(_)
            | ContainerError::TypeMismatch(_) => Self::Lookup(e.to_string()),
            ContainerError::Duplicate(_) => Self::Configuration(e.to_string()),
            ContainerError::Startup { .. } => Self::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation {
            message: "クエリパラメータが不正です".to_string(),
            context: Some(serde_json::json!({ "reason": rejection.body_text() })),
        }
    }
}
