//! # リレーショナル DB マネージャー
//!
//! sqlx の `Any` ドライバで PostgreSQL / MySQL / SQLite を同じ型で扱う。
//!
//! ## 接続プールの設定
//!
//! - `max_connections(10)`: 最大接続数。本番環境では負荷に応じて調整
//! - `acquire_timeout(5秒)`: 接続取得のタイムアウト。超過時はエラー

use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use sqlx::{AnyPool, any::AnyPoolOptions};

use super::{DatabaseKind, DatabaseManager, DbSession, ensure_sqlite_dir};
use crate::error::InfraError;

/// sqlx `AnyPool` を保持するリレーショナル DB マネージャー
pub struct SqlDatabase {
    name: String,
    url:  String,
    pool: RwLock<Option<AnyPool>>,
}

impl SqlDatabase {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url:  url.into(),
            pool: RwLock::new(None),
        }
    }

    /// 接続プールを取得する（未接続なら `None`）
    ///
    /// `AnyPool` は内部で Arc を共有するため、clone は安価。
    pub fn pool(&self) -> Option<AnyPool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }
}

#[async_trait]
impl DatabaseManager for SqlDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Relational
    }

    fn is_connected(&self) -> bool {
        self.pool().is_some()
    }

    #[tracing::instrument(skip_all, fields(database = %self.name), err)]
    async fn connect(&self) -> Result<(), InfraError> {
        if self.is_connected() {
            return Ok(());
        }

        sqlx::any::install_default_drivers();
        if self.is_sqlite() {
            ensure_sqlite_dir(&self.url)?;
        }

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&self.url)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;

        *self.pool.write().unwrap_or_else(PoisonError::into_inner) = Some(pool);
        tracing::info!(database = %self.name, "データベースに接続しました");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), InfraError> {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::info!(database = %self.name, "データベース接続を閉じました");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let Some(pool) = self.pool() else {
            return false;
        };
        match sqlx::query("SELECT 1").execute(&pool).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(database = %self.name, error = %e, "ヘルスチェックに失敗しました");
                false
            }
        }
    }

    async fn begin(&self) -> Result<DbSession, InfraError> {
        let pool = self
            .pool()
            .ok_or_else(|| InfraError::not_connected(&self.name))?;
        let tx = pool.begin().await?;
        Ok(DbSession::new(&self.name, tx))
    }
}
