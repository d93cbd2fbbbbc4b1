//! # Kiln API サーバー
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（.env ファイルを使用）
//! cargo run -p kiln-api
//!
//! # データベースとキャッシュを有効化
//! USE_DATABASE=true CACHE_URL=redis://localhost:6379 cargo run -p kiln-api
//! ```
//!
//! 環境変数の一覧は [`kiln_api::config`] を参照。

use std::sync::Arc;

use anyhow::Context as _;
use kiln_api::{
    app_builder::build_app,
    bootstrap::{build_container, configure_databases},
    config::Settings,
    state::AppState,
};
use kiln_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    // 本番環境では .env ファイルは使用せず、環境変数を直接設定する
    dotenvy::dotenv().ok();

    // ログレベル・形式は設定に含まれるため、トレーシングより先に読み込む
    let settings = Arc::new(Settings::from_env().context("設定の読み込みに失敗しました")?);

    let tracing_config = TracingConfig::new(
        env!("CARGO_PKG_NAME"),
        settings.log_format,
        settings.log_level.as_directive(),
    )
    .with_quiet_dependencies(!settings.debug);
    init_tracing(&tracing_config);
    let _app_span = tracing::info_span!("app", service = %tracing_config.service_name).entered();

    tracing::info!(
        app = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        "アプリケーションを起動します"
    );

    // データベース（個別の接続失敗はログに出力して続行）
    let registry = Arc::new(configure_databases(&settings)?);
    let report = registry.connect_all().await;
    if report.has_failures() {
        tracing::warn!(
            failed = report.failed.len(),
            "一部のデータベースに接続できませんでした"
        );
    }

    // サービス（初期化失敗は起動を中止）
    let container = Arc::new(build_container(Arc::clone(&settings))?);
    if let Err(e) = container.startup().await {
        tracing::error!(error = %e, "起動に失敗しました");
        container.shutdown().await;
        registry.shutdown().await;
        return Err(e.into());
    }

    let app = build_app(AppState::new(Arc::clone(&container), Arc::clone(&registry)));
    let served = serve(&settings, app).await;

    tracing::info!("アプリケーションを停止します");
    container.shutdown().await;
    registry.shutdown().await;
    tracing::info!("アプリケーションを停止しました");

    served
}

async fn serve(settings: &Settings, app: axum::Router) -> anyhow::Result<()> {
    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("{addr} へのバインドに失敗しました"))?;
    tracing::info!("サーバーを起動しました: {}", addr);
    if let Some(docs_url) = settings.public_docs_url() {
        tracing::debug!(docs_url, "ドキュメント URL");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("サーバーが異常終了しました")
}

/// SIGINT（Ctrl+C）または SIGTERM を待つ
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C ハンドラの登録に失敗しました");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM ハンドラの登録に失敗しました");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("シャットダウンシグナルを受信しました");
}
