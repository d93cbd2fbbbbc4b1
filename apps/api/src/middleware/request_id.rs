//! # リクエスト ID の伝播
//!
//! `SetRequestIdLayer` が extensions に載せた [`RequestId`] をリクエスト処理中の
//! タスクに紐付ける。エラーボディの `request_id` はここから取り出す。

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tower_http::request_id::RequestId;

tokio::task_local! {
    static CURRENT: RequestId;
}

/// 処理中リクエストの ID（リクエスト外や非 ASCII の値なら `None`）
pub fn current_request_id() -> Option<String> {
    CURRENT
        .try_with(|id| id.header_value().to_str().ok().map(str::to_owned))
        .ok()
        .flatten()
}

/// extensions の [`RequestId`] を task-local に載せてから後続を実行する
pub async fn store_request_id(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<RequestId>().cloned() {
        Some(id) => CURRENT.scope(id, next.run(request)).await,
        None => next.run(request).await,
    }
}

#[cfg(test)]
pub(crate) async fn scope_request_id<F: Future>(request_id: &str, future: F) -> F::Output {
    let value = axum::http::HeaderValue::from_str(request_id).expect("ヘッダー値として有効な ID");
    CURRENT.scope(RequestId::new(value), future).await
}
