//! # 起動時の組み立て
//!
//! 設定からデータベースレジストリとサービスコンテナを構築する。
//! 接続・初期化はここでは行わず、`main` が順に実行する。

use std::sync::Arc;

use kiln_infra::{DatabaseRegistry, InfraError, db};

use crate::{
    config::Settings,
    container::{ContainerError, ServiceContainer},
    service::{CacheService, ExampleService},
};

/// 主データベースの登録名
pub const MAIN_DATABASE: &str = "main";

/// 設定に従ってデータベースを登録する
///
/// `USE_DATABASE` が無効なら空のレジストリを返す。
/// `DATABASE_URL` 未設定時は組み込み SQLite（`./temp/app.db`）を使う。
/// 主データベースは必須コンポーネントとして登録する。
pub fn configure_databases(settings: &Settings) -> Result<DatabaseRegistry, InfraError> {
    let mut registry = DatabaseRegistry::new();
    if !settings.use_database {
        tracing::info!("データベースは無効です");
        return Ok(registry);
    }

    let url = settings
        .database_url
        .as_deref()
        .unwrap_or(db::DEFAULT_SQLITE_URL);
    let manager = db::open_manager(MAIN_DATABASE, url)?;
    tracing::info!(
        database = MAIN_DATABASE,
        kind = %manager.kind(),
        "データベースを登録しました"
    );
    registry.register(MAIN_DATABASE, manager)?;

    Ok(registry)
}

/// サービスコンテナを組み立てる
///
/// キャッシュサービスは `CACHE_URL` が設定されている場合のみ登録する。
pub fn build_container(settings: Arc<Settings>) -> Result<ServiceContainer, ContainerError> {
    let cache_enabled = settings.cache_url.is_some();
    let mut container = ServiceContainer::new(settings);

    container.register("examples", ExampleService::new)?;
    if cache_enabled {
        container.register_stateful("cache", CacheService::new)?;
    }

    Ok(container)
}
