//! # キーバリュー DB マネージャー
//!
//! Redis の `ConnectionManager` を保持する。疎通確認は `PING`。

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{DatabaseKind, DatabaseManager};
use crate::{error::InfraError, redis::create_connection_manager};

/// Redis 接続を保持するキーバリュー DB マネージャー
pub struct RedisDatabase {
    name: String,
    url:  String,
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisDatabase {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url:  url.into(),
            conn: RwLock::new(None),
        }
    }

    /// 接続を取得する（未接続なら `None`）
    ///
    /// `ConnectionManager` は clone して複数タスクで共有できる。
    pub fn connection(&self) -> Option<ConnectionManager> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DatabaseManager for RedisDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::KeyValue
    }

    fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    #[tracing::instrument(skip_all, fields(database = %self.name), err)]
    async fn connect(&self) -> Result<(), InfraError> {
        if self.is_connected() {
            return Ok(());
        }
        let conn = create_connection_manager(&self.url).await?;
        *self.conn.write().unwrap_or_else(PoisonError::into_inner) = Some(conn);
        tracing::info!(database = %self.name, "Redis に接続しました");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), InfraError> {
        let conn = self
            .conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if conn.is_some() {
            tracing::info!(database = %self.name, "Redis 接続を閉じました");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let Some(mut conn) = self.connection() else {
            return false;
        };
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(reply) => reply == "PONG",
            Err(e) => {
                tracing::warn!(database = %self.name, error = %e, "ヘルスチェックに失敗しました");
                false
            }
        }
    }
}
