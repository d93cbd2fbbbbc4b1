//! # サービス基盤
//!
//! コンテナで管理するサービスの能力を 2 段階で定義する。
//!
//! - [`Service`]: 状態を持たないサービス。構築直後から利用できる
//! - [`StatefulService`]: 外部リソースを持つサービス。
//!   [`initialize`](StatefulService::initialize) が成功するまで利用できない
//!
//! サービスは設定（`Arc<Settings>`）を受け取って構築する。
//! データベースはレジストリ経由で取得し、サービス自身は接続を所有しない。

pub mod cache;
pub mod example;

use async_trait::async_trait;
use kiln_infra::InfraError;
use kiln_shared::health::ComponentHealth;
use thiserror::Error;

pub use cache::CacheService;
pub use example::ExampleService;

/// 状態を持たないサービス
pub trait Service: Send + Sync + 'static {
    /// コンテナに登録する名前
    fn name(&self) -> &'static str;
}

/// 初期化・後片付けを伴うサービス
///
/// コンテナが [`startup`](crate::container::ServiceContainer::startup) で
/// `initialize` を呼び、[`shutdown`](crate::container::ServiceContainer::shutdown)
/// で `cleanup` を呼ぶ。
#[async_trait]
pub trait StatefulService: Service {
    /// 外部リソースを準備する
    ///
    /// 設定不足は [`ServiceError::Configuration`] を返す（再試行しない）。
    async fn initialize(&self) -> Result<(), ServiceError>;

    /// 保持しているリソースを解放する
    ///
    /// 初期化前・初期化失敗後に呼ばれても安全で、2 回目以降は何もしない。
    async fn cleanup(&self) -> Result<(), ServiceError>;

    /// 現在の状態を返す（失敗は `error` ステータスで表す）
    async fn health_check(&self) -> ComponentHealth;

    /// 失敗時に全体を `unhealthy` とするか
    fn required(&self) -> bool {
        true
    }
}

/// サービス層のエラー
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 必要な設定が不足している
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// 初期化前に利用された
    #[error("サービス '{0}' は初期化されていません")]
    NotInitialized(&'static str),

    /// 対象が見つからない
    #[error("{0}")]
    NotFound(String),

    /// 入力値が不正
    #[error("{message}")]
    Validation {
        message: String,
        context: Option<serde_json::Value>,
    },

    /// インフラ層のエラー
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// 外部システムとの通信失敗など
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>, context: serde_json::Value) -> Self {
        Self::Validation {
            message: message.into(),
            context: Some(context),
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(e: redis::RedisError) -> Self {
        Self::Infra(e.into())
    }
}
