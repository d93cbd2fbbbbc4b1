//! # キャッシュサービス
//!
//! Redis をバックエンドとするキーバリューキャッシュ。`CACHE_URL` が必要。

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use kiln_infra::redis::create_connection_manager;
use kiln_shared::health::ComponentHealth;
use redis::{AsyncCommands, aio::ConnectionManager};

use super::{Service, ServiceError, StatefulService};
use crate::config::Settings;

/// Redis キャッシュサービス
pub struct CacheService {
    settings: Arc<Settings>,
    conn:     RwLock<Option<ConnectionManager>>,
}

impl CacheService {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            conn: RwLock::new(None),
        }
    }

    fn connection(&self) -> Result<ConnectionManager, ServiceError> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ServiceError::NotInitialized("cache"))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut conn = self.connection()?;
        Ok(conn.get(key).await?)
    }

    /// 値を保存する（`ttl` 指定時は期限付き）
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), ServiceError> {
        let mut conn = self.connection()?;
        match ttl {
            Some(ttl) => {
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                    .await?;
            }
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    /// キーを削除する（削除した場合は `true`）
    pub async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let mut conn = self.connection()?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

impl Service for CacheService {
    fn name(&self) -> &'static str {
        "cache"
    }
}

#[async_trait]
impl StatefulService for CacheService {
    async fn initialize(&self) -> Result<(), ServiceError> {
        let url = self.settings.cache_url.as_deref().ok_or_else(|| {
            ServiceError::Configuration("CACHE_URL が設定されていません".to_string())
        })?;

        let mut conn = create_connection_manager(url).await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        *self.conn.write().unwrap_or_else(PoisonError::into_inner) = Some(conn);
        tracing::info!("キャッシュに接続しました");
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ServiceError> {
        let conn = self
            .conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if conn.is_some() {
            tracing::info!("キャッシュ接続を閉じました");
        }
        Ok(())
    }

    async fn health_check(&self) -> ComponentHealth {
        let Ok(mut conn) = self.connection() else {
            return ComponentHealth::error("初期化されていません");
        };
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => ComponentHealth::ok(),
            Err(e) => ComponentHealth::error(e.to_string()),
        }
    }

    /// キャッシュが落ちても API 自体は応答できる
    fn required(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn service(vars: &[(&str, &str)]) -> CacheService {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let settings = Settings::from_lookup(|key| vars.get(key).cloned()).unwrap();
        CacheService::new(Arc::new(settings))
    }

    #[tokio::test]
    async fn test_cache_url未設定の初期化は設定エラー() {
        let cache = service(&[]);

        let err = cache.initialize().await.unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_不正なcache_urlの初期化はインフラエラー() {
        let cache = service(&[("CACHE_URL", "not-a-redis-url")]);

        let err = cache.initialize().await.unwrap_err();
        assert!(matches!(err, ServiceError::Infra(_)));
    }

    #[tokio::test]
    async fn test_初期化前の操作はnot_initialized() {
        let cache = service(&[]);

        let err = cache.get("key").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotInitialized("cache")));
    }

    #[tokio::test]
    async fn test_初期化前のヘルスチェックはerror() {
        let cache = service(&[]);

        let health = cache.health_check().await;
        assert!(!health.is_ok());
        assert_eq!(health.detail.as_deref(), Some("初期化されていません"));
    }

    #[tokio::test]
    async fn test_cleanupは初期化前でも繰り返し呼べる() {
        let cache = service(&[]);

        cache.cleanup().await.unwrap();
        cache.cleanup().await.unwrap();
        assert!(!cache.required());
    }
}
