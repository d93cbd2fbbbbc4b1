//! # アプリケーション構築
//!
//! ルーター定義とミドルウェアの組み立てを担当する。
//! `main.rs` は設定読み込み・ライフサイクル管理・サーバー起動に集中する。

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::get,
};
use kiln_shared::observability::{
    MakeRequestUuidV7,
    make_request_span,
    request_timing::RequestTimingLayer,
};
use tower_http::{
    cors::{AllowHeaders, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    config::Settings,
    handler::{
        api_info,
        basic_example,
        get_item,
        health_check,
        method_not_allowed,
        not_found,
        paginated_example,
        protected_example,
    },
    middleware::store_request_id,
    state::AppState,
};

/// CORS で許可するメソッド
const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// ルーターを構築する
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);
    let prefix = state.settings.api_v1_prefix.clone();

    // API v1 ルート
    let api = Router::new()
        .route("/examples/basic", get(basic_example))
        .route("/examples/protected", get(protected_example))
        .route("/examples/paginated", get(paginated_example))
        .route("/examples/items/{id}", get(get_item));

    let router = Router::new()
        .route("/", get(api_info))
        .route("/system/health", get(health_check));
    // `API_V1_PREFIX=/` は末尾除去で空文字になる
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    // レイヤーは下から順に外側を包む:
    // 1. SetRequestIdLayer（最外）: UUID v7 を採番（クライアント提供値があればそれを使用）
    // 2. CorsLayer: プリフライトに応答
    // 3. TraceLayer: request_id を含むスパンを作成
    // 4. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
    // 5. RequestTimingLayer: X-Process-Time の付与と完了ログ
    // 6. store_request_id: ハンドラーから参照できるよう task-local に保存
    router
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(from_fn(store_request_id))
        .layer(RequestTimingLayer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}

/// `ALLOWED_HOSTS` から CORS レイヤーを作る
///
/// `*` を含む場合は全オリジンを許可し、資格情報付きリクエストは許可しない。
/// 個別指定の場合のみ `allow_credentials` を有効にする。
fn cors_layer(settings: &Settings) -> CorsLayer {
    if settings.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(CORS_METHODS)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .allowed_hosts
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "不正なオリジンを無視します");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
