//! # Observability 基盤
//!
//! トレーシング初期化とログ出力形式の設定、リクエスト単位の相関 ID を提供する。
//!
//! - [`LogFormat`] / [`TracingConfig`]: `LOG_FORMAT` / `LOG_LEVEL` による出力切り替え
//! - [`init_tracing`]: subscriber の初期化（`observability` feature）
//! - [`MakeRequestUuidV7`] / [`make_request_span`]: tower-http の Request ID / Trace レイヤー用
//! - [`request_timing`]: リクエスト完了ログと `X-Process-Time` ヘッダー

#[cfg(feature = "observability")]
pub mod request_timing;

/// Request ID を運ぶ HTTP ヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1 イベント 1 行の JSON（集約基盤向け）
    Json,
    /// 人が読む端末向け
    #[default]
    Pretty,
}

impl LogFormat {
    /// `json` / `pretty` / `text`（`pretty` の別名）を大文字小文字を区別せず解釈する
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// サービス名（JSON ログの `span.service` フィールドに出力）
    pub service_name:       String,
    /// ログ出力形式
    pub log_format:         LogFormat,
    /// `RUST_LOG` 未設定時に使うログレベル（例: `"info"`）
    pub log_level:          String,
    /// 依存クレート（sqlx, tower_http）のログを warn 以上に絞る
    pub quiet_dependencies: bool,
}

impl TracingConfig {
    /// 新しい設定を作成する
    pub fn new(
        service_name: impl Into<String>,
        log_format: LogFormat,
        log_level: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
            log_level: log_level.into(),
            quiet_dependencies: false,
        }
    }

    /// 依存クレートのログ抑制を設定する
    pub fn with_quiet_dependencies(mut self, quiet: bool) -> Self {
        self.quiet_dependencies = quiet;
        self
    }

    /// `RUST_LOG` 未設定時に使う EnvFilter ディレクティブ
    pub fn default_directive(&self) -> String {
        if self.quiet_dependencies {
            format!("{},sqlx=warn,tower_http=warn", self.log_level)
        } else {
            self.log_level.clone()
        }
    }
}

/// トレーシングを初期化する
///
/// `RUST_LOG` 環境変数が設定されていればそれを優先し、
/// 未設定の場合は [`TracingConfig::default_directive`] を使う。
///
/// JSON モードでは以下のフィールドがトップレベルに出力される:
/// - `timestamp`, `level`, `target`, `message`
///
/// `ErrorLayer` を登録するため、`tracing_error::SpanTrace` によるエラー発生経路の
/// 記録が有効になる。
#[cfg(feature = "observability")]
pub fn init_tracing(config: &TracingConfig) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.default_directive().into());

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();
}

/// UUID v7 で Request ID を生成する `MakeRequestId` 実装
///
/// v7 は時刻順にソート可能なため、ログ検索時に発生順で並べやすい。
#[cfg(feature = "observability")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

#[cfg(feature = "observability")]
impl tower_http::request_id::MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(
        &mut self,
        _request: &http::Request<B>,
    ) -> Option<tower_http::request_id::RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        http::HeaderValue::from_str(&id)
            .ok()
            .map(tower_http::request_id::RequestId::new)
    }
}

/// TraceLayer 用のリクエストスパンを生成する
///
/// `SetRequestIdLayer` が付与した `x-request-id` をスパンフィールドに含めるため、
/// スパン内で出力されたすべてのログに `request_id` が自動で付く。
#[cfg(feature = "observability")]
pub fn make_request_span<B>(request: &http::Request<B>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
