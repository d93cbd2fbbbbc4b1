//! # リクエスト計測
//!
//! 各リクエストの処理時間を `X-Process-Time`（秒、小数 6 桁）として返し、
//! 完了時に method / path / status / latency を 1 行で記録する。
//!
//! `TraceLayer` の内側に置けば、記録にリクエストスパンの `request_id` が付く:
//!
//! ```text
//! TraceLayer → RequestTimingLayer → handler
//! ```

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use http::{HeaderValue, Method, Request, Response};
use tower::{Layer, Service};

/// 処理時間を返すレスポンスヘッダー名
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// ヘルスチェックは監視から高頻度で呼ばれるため完了ログを出さない
fn is_quiet_path(path: &str) -> bool {
    path.ends_with("/health")
}

fn process_time_value(elapsed: Duration) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())).ok()
}

/// 計測中のリクエスト
struct Timing {
    method: Method,
    path:   String,
    start:  Instant,
}

impl Timing {
    fn start<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            path:   req.uri().path().to_owned(),
            start:  Instant::now(),
        }
    }

    fn latency_ms(elapsed: Duration) -> u64 {
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn finish<B>(self, response: &mut Response<B>) {
        let elapsed = self.start.elapsed();
        if let Some(value) = process_time_value(elapsed) {
            response.headers_mut().insert(PROCESS_TIME_HEADER, value);
        }
        if is_quiet_path(&self.path) {
            return;
        }
        tracing::info!(
            http.method = %self.method,
            http.path = %self.path,
            http.status_code = response.status().as_u16(),
            http.latency_ms = Self::latency_ms(elapsed),
            "リクエスト完了"
        );
    }

    fn fail(self, err: &dyn std::fmt::Display) {
        tracing::error!(
            http.method = %self.method,
            http.path = %self.path,
            http.latency_ms = Self::latency_ms(self.start.elapsed()),
            error.message = %err,
            "リクエスト処理エラー"
        );
    }
}

/// [`RequestTimingService`] を差し込む Layer
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestTimingLayer;

impl<S> Layer<S> for RequestTimingLayer {
    type Service = RequestTimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTimingService { inner }
    }
}

#[derive(Clone, Debug)]
pub struct RequestTimingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestTimingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // poll_ready 済みのインスタンスで呼び出し、手元には複製を残す
        let ready = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, ready);
        let timing = Timing::start(&req);

        Box::pin(async move {
            match inner.call(req).await {
                Ok(mut response) => {
                    timing.finish(&mut response);
                    Ok(response)
                }
                Err(err) => {
                    timing.fail(&err);
                    Err(err)
                }
            }
        })
    }
}
