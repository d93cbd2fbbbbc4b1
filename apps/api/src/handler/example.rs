//! # サンプルエンドポイント
//!
//! 設定・認証・サービスコンテナの受け取り方を示す雛形。
//! 新しいルートモジュールを追加する際の参考にする。

use axum::{
    Json,
    extract::{Path, Query, State, rejection::PathRejection, rejection::QueryRejection},
};
use kiln_shared::pagination::{PaginatedResponse, Pagination};
use serde::{Deserialize, Serialize};

use crate::{
    config::Environment,
    error::ApiError,
    extractor::{AuthenticatedUser, CurrentUser, User},
    service::example::{ExampleItem, SortField, SortOrder},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct BasicResponse {
    pub message:       &'static str,
    pub environment:   Environment,
    pub authenticated: bool,
    pub user_id:       Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    pub message:     &'static str,
    pub user:        User,
    pub environment: Environment,
}

/// `GET {prefix}/examples/paginated` のクエリ
#[derive(Debug, Deserialize)]
pub struct PaginatedQuery {
    pub skip:       Option<i64>,
    pub limit:      Option<i64>,
    pub sort_by:    Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemsListResponse {
    #[serde(flatten)]
    pub page:               PaginatedResponse<ExampleItem>,
    pub sort_by:            &'static str,
    pub sort_order:         &'static str,
    pub user_authenticated: bool,
}

/// 任意認証のエンドポイント
pub async fn basic_example(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<BasicResponse>, ApiError> {
    let examples = state.container.examples()?;
    tracing::info!(authenticated = user.is_some(), "basic example が呼ばれました");

    Ok(Json(BasicResponse {
        message:       "This is a basic example endpoint",
        environment:   examples.environment(),
        authenticated: user.is_some(),
        user_id:       user.map(|u| u.id),
    }))
}

/// 認証必須のエンドポイント
pub async fn protected_example(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "This is a protected example endpoint",
        user,
        environment: state.settings.environment,
    })
}

/// ページネーション・並び替え付きの一覧
///
/// `skip` は 0 以上、`limit` は 1〜1000 に丸める。
/// 並び替えのキー・順序が不正な場合は 400。
pub async fn paginated_example(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<PaginatedQuery>, QueryRejection>,
) -> Result<Json<ItemsListResponse>, ApiError> {
    let Query(query) = query?;
    let pagination = Pagination::from_query(query.skip, query.limit);
    let sort_by = SortField::parse_param(query.sort_by.as_deref())?;
    let sort_order = SortOrder::parse_param(query.sort_order.as_deref())?;

    let page = state
        .container
        .examples()?
        .list_items(pagination, sort_by, sort_order);

    Ok(Json(ItemsListResponse {
        page:               PaginatedResponse {
            items: page.items,
            total: page.total,
            skip:  page.pagination.skip,
            limit: page.pagination.limit,
        },
        sort_by:            page.sort_by.as_str(),
        sort_order:         page.sort_order.as_str(),
        user_authenticated: user.is_some(),
    }))
}

/// 1 件取得（存在しない id は 404）
pub async fn get_item(
    State(state): State<AppState>,
    id: Result<Path<u32>, PathRejection>,
) -> Result<Json<ExampleItem>, ApiError> {
    let Path(id) = id.map_err(|rejection| ApiError::Validation {
        message: "パスパラメータが不正です".to_string(),
        context: Some(serde_json::json!({ "reason": rejection.body_text() })),
    })?;

    let item = state.container.examples()?.find_item(id)?;
    Ok(Json(item))
}
