//! # ルーターの統合テスト
//!
//! `build_app` が組み立てたルーター全体に `oneshot` でリクエストを送り、
//! ルーティング・認証・エラーレスポンス・ヘルスチェックの振る舞いを検証する。
//!
//! 実行方法:
//! ```bash
//! cargo test -p kiln-api --test router_test
//! ```

use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    response::Response,
};
use http::{Method, Request, StatusCode, header};
use kiln_api::{
    app_builder::build_app,
    bootstrap::{build_container, configure_databases},
    config::Settings,
    state::AppState,
};
use kiln_infra::{DatabaseRegistry, mock::MockDatabase};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

const PROD_SECRET: &str = "prod-secret-prod-secret-prod-secret!";

fn settings(pairs: &[(&str, &str)]) -> Arc<Settings> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Arc::new(Settings::from_lookup(|key| vars.get(key).cloned()).unwrap())
}

async fn app_with(settings: Arc<Settings>, registry: DatabaseRegistry) -> Router {
    let registry = Arc::new(registry);
    registry.connect_all().await;
    let container = Arc::new(build_container(settings).unwrap());
    container.startup().await.unwrap();
    build_app(AppState::new(container, registry))
}

async fn app(pairs: &[(&str, &str)]) -> Router {
    app_with(settings(pairs), DatabaseRegistry::new()).await
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- システムエンドポイント ---

#[tokio::test]
async fn test_ルートはapi情報を返す() {
    let response = get(app(&[("APP_NAME", "Orders API")]).await, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Orders API");
    assert_eq!(body["environment"], "development");
    assert_eq!(body["api_version"], "v1");
    assert_eq!(body["docs_url"], "/docs");
    assert_eq!(body["api_prefix"], "/api/v1");
}

#[tokio::test]
async fn test_本番環境ではdocs_urlを返さない() {
    let app = app(&[("ENVIRONMENT", "production"), ("SECRET_KEY", PROD_SECRET)]).await;

    let body = body_json(get(app, "/").await).await;

    assert_eq!(body["environment"], "production");
    assert_eq!(body["docs_url"], Value::Null);
}

#[tokio::test]
async fn test_コンポーネントがなければhealthy() {
    let response = get(app(&[]).await, "/system/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"], json!({}));
    assert_eq!(body["uptime"], "running");
    assert!(body["timestamp"].is_string());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_必須データベースの異常は503() {
    let mut registry = DatabaseRegistry::new();
    registry
        .register("main", Arc::new(MockDatabase::new("main").failing_connect()))
        .unwrap();
    let app = app_with(settings(&[]), registry).await;

    let response = get(app, "/system/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["components"]["database:main"]["status"], "error");
    assert_eq!(body["components"]["database:main"]["required"], true);
}

#[tokio::test]
async fn test_任意データベースの異常はdegradedで200() {
    let mut registry = DatabaseRegistry::new();
    registry
        .register("main", Arc::new(MockDatabase::new("main")))
        .unwrap();
    registry
        .register_optional(
            "analytics",
            Arc::new(MockDatabase::new("analytics").failing_connect()),
        )
        .unwrap();
    let app = app_with(settings(&[]), registry).await;

    let response = get(app, "/system/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["database:main"]["status"], "ok");
    assert_eq!(body["components"]["database:analytics"]["status"], "error");
}

#[tokio::test]
async fn test_組み込みsqliteに接続したヘルスチェック() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
    let settings = settings(&[("USE_DATABASE", "true"), ("DATABASE_URL", url.as_str())]);
    let registry = configure_databases(&settings).unwrap();
    let app = app_with(settings, registry).await;

    let body = body_json(get(app, "/system/health").await).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["database:main"]["status"], "ok");
}

// --- サンプルエンドポイント ---

#[tokio::test]
async fn test_basicは認証なしでも応答する() {
    let body = body_json(get(app(&[]).await, "/api/v1/examples/basic").await).await;

    assert_eq!(body["message"], "This is a basic example endpoint");
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["user_id"], Value::Null);
}

#[tokio::test]
async fn test_basicはbearerトークンで利用者を識別する() {
    let request = Request::get("/api/v1/examples/basic")
        .header(header::AUTHORIZATION, "Bearer any-token")
        .body(Body::empty())
        .unwrap();

    let body = body_json(send(app(&[]).await, request).await).await;

    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user_id"], "user123");
}

#[tokio::test]
async fn test_protectedは認証がなければ401() {
    let response = get(app(&[]).await, "/api/v1/examples/protected").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = body_json(response).await;
    assert_eq!(body["title"], "Unauthorized");
    assert_eq!(body["detail"], "認証が必要です");
    assert_eq!(body["request_id"], request_id);
}

#[tokio::test]
async fn test_protectedは認証済みなら利用者を返す() {
    let request = Request::get("/api/v1/examples/protected")
        .header(header::AUTHORIZATION, "Bearer any-token")
        .body(Body::empty())
        .unwrap();

    let response = send(app(&[]).await, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["user"],
        json!({ "id": "user123", "username": "testuser", "email": "test@example.com" })
    );
}

#[tokio::test]
async fn test_paginatedは指定範囲を返す() {
    let response = get(
        app(&[]).await,
        "/api/v1/examples/paginated?skip=5&limit=3",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<i64> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![6, 7, 8]);
    assert_eq!(body["total"], 20);
    assert_eq!(body["skip"], 5);
    assert_eq!(body["limit"], 3);
    assert_eq!(body["sort_by"], "created_at");
    assert_eq!(body["sort_order"], "desc");
    assert_eq!(body["user_authenticated"], false);
}

#[tokio::test]
async fn test_paginatedは範囲外の値を丸める() {
    let body = body_json(
        get(
            app(&[]).await,
            "/api/v1/examples/paginated?skip=-3&limit=5000",
        )
        .await,
    )
    .await;

    assert_eq!(body["skip"], 0);
    assert_eq!(body["limit"], 1000);
    assert_eq!(body["items"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_paginatedは並び替えに対応する() {
    let body = body_json(
        get(
            app(&[]).await,
            "/api/v1/examples/paginated?limit=2&sort_by=id&sort_order=desc",
        )
        .await,
    )
    .await;

    assert_eq!(body["items"][0]["id"], 20);
    assert_eq!(body["items"][1]["id"], 19);
}

#[tokio::test]
async fn test_不正なsort_byは400() {
    let response = get(app(&[]).await, "/api/v1/examples/paginated?sort_by=bogus").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Validation Error");
    assert_eq!(body["context"]["field"], "sort_by");
}

#[tokio::test]
async fn test_数値でないlimitは400() {
    let response = get(app(&[]).await, "/api/v1/examples/paginated?limit=abc").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Validation Error");
}

#[tokio::test]
async fn test_itemsは存在するidを返す() {
    let response = get(app(&[]).await, "/api/v1/examples/items/3").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({ "id": 3, "name": "Item 3", "created_at": "2024-01-01T00:00:00Z" })
    );
}

#[tokio::test]
async fn test_itemsは存在しないidで404() {
    let response = get(app(&[]).await, "/api/v1/examples/items/99").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["type"], "https://kiln.example.com/errors/not-found");
    assert_eq!(body["detail"], "アイテム 99 が見つかりません");
}

#[tokio::test]
async fn test_itemsは数値でないidで400() {
    let response = get(app(&[]).await, "/api/v1/examples/items/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- ルーティング ---

#[tokio::test]
async fn test_未定義のルートはproblem_detailsの404() {
    let response = get(app(&[]).await, "/no/such/route").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["title"], "Not Found");
}

#[tokio::test]
async fn test_未許可のメソッドは405() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/system/health")
        .body(Body::empty())
        .unwrap();

    let response = send(app(&[]).await, request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(body["status"], 405);
}

#[tokio::test]
async fn test_api_v1_prefixを変更できる() {
    let app = app(&[("API_V1_PREFIX", "/v2/")]).await;

    let response = get(app.clone(), "/v2/examples/basic").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(app, "/api/v1/examples/basic").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_全レスポンスにx_process_timeが付く() {
    let response = get(app(&[]).await, "/no/such/route").await;

    let value = response
        .headers()
        .get("x-process-time")
        .expect("x-process-time ヘッダーが含まれること")
        .to_str()
        .unwrap();
    assert!(value.parse::<f64>().unwrap() >= 0.0);
}

// --- CORS ---

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/examples/basic")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_ワイルドカード指定では全オリジンを許可する() {
    let response = send(app(&[]).await, preflight("https://any.example")).await;

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
    );
}

#[tokio::test]
async fn test_個別指定のオリジンのみ資格情報付きで許可する() {
    let app = app(&[("ALLOWED_HOSTS", "https://app.example")]).await;

    let response = send(app.clone(), preflight("https://app.example")).await;
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://app.example"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );

    let response = send(app, preflight("https://evil.example")).await;
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}
