//! # Request ID レイヤーのテスト
//!
//! `build_app` の Request ID 関連レイヤー（SetRequestIdLayer + PropagateRequestIdLayer +
//! store_request_id）が正しく動作することを検証する。
//!
//! - レスポンスに `X-Request-Id` ヘッダーが含まれる
//! - クライアント提供の `X-Request-Id` がそのまま返される
//! - 自動生成の `X-Request-Id` が UUID v7 形式である
//! - エラーボディの `request_id` がヘッダーと一致する

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
};
use http::{Request, StatusCode};
use kiln_api::{
    app_builder::build_app,
    bootstrap::build_container,
    config::Settings,
    state::AppState,
};
use kiln_infra::DatabaseRegistry;
use tower::ServiceExt;

fn test_app() -> Router {
    let settings = Arc::new(Settings::from_lookup(|_| None).unwrap());
    let container = Arc::new(build_container(settings).unwrap());
    build_app(AppState::new(container, Arc::new(DatabaseRegistry::new())))
}

fn request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_レスポンスにx_request_idヘッダーが含まれる() {
    let response = test_app().oneshot(request("/system/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("x-request-id"),
        "レスポンスに x-request-id ヘッダーが含まれること"
    );
}

#[tokio::test]
async fn test_クライアント提供のx_request_idがそのまま返される() {
    let custom_id = "client-provided-request-id-123";

    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/system/health")
                .header("x-request-id", custom_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .unwrap()
            .to_str()
            .unwrap(),
        custom_id,
        "クライアント提供の Request ID がそのまま返されること"
    );
}

#[tokio::test]
async fn test_自動生成のx_request_idがuuid_v7形式である() {
    let response = test_app().oneshot(request("/")).await.unwrap();

    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap();

    let uuid = uuid::Uuid::parse_str(request_id)
        .unwrap_or_else(|_| panic!("有効な UUID であること: {request_id}"));
    assert_eq!(
        uuid.get_version(),
        Some(uuid::Version::SortRand),
        "UUID v7（SortRand）であること"
    );
}

#[tokio::test]
async fn test_エラーボディのrequest_idがヘッダーと一致する() {
    let custom_id = "trace-me-456";

    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/examples/items/404")
                .header("x-request-id", custom_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], custom_id);
}
