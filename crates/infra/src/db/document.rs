//! # ドキュメント DB マネージャー（`mongodb` feature）
//!
//! 疎通確認は `admin` データベースへの `{ ping: 1 }` コマンド。

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use mongodb::{Client, Database, bson::doc};

use super::{DatabaseKind, DatabaseManager};
use crate::error::InfraError;

/// URL にデータベース名が含まれない場合に使う名前
const DEFAULT_DATABASE_NAME: &str = "main";

/// MongoDB クライアントを保持するドキュメント DB マネージャー
pub struct MongoDatabase {
    name:   String,
    url:    String,
    client: RwLock<Option<Client>>,
}

impl MongoDatabase {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name:   name.into(),
            url:    url.into(),
            client: RwLock::new(None),
        }
    }

    /// クライアントを取得する（未接続なら `None`）
    pub fn client(&self) -> Option<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// URL で指定されたデータベース（未指定なら `main`）を返す
    pub fn database(&self) -> Option<Database> {
        self.client().map(|client| {
            client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE_NAME))
        })
    }

    async fn ping(client: &Client) -> Result<(), InfraError> {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseManager for MongoDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Document
    }

    fn is_connected(&self) -> bool {
        self.client().is_some()
    }

    #[tracing::instrument(skip_all, fields(database = %self.name), err)]
    async fn connect(&self) -> Result<(), InfraError> {
        if self.is_connected() {
            return Ok(());
        }
        let client = Client::with_uri_str(&self.url).await?;
        Self::ping(&client).await?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
        tracing::info!(database = %self.name, "MongoDB に接続しました");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), InfraError> {
        let client = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = client {
            client.shutdown().await;
            tracing::info!(database = %self.name, "MongoDB 接続を閉じました");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let Some(client) = self.client() else {
            return false;
        };
        match Self::ping(&client).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(database = %self.name, error = %e, "ヘルスチェックに失敗しました");
                false
            }
        }
    }
}
