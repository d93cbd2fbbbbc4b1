//! # Kiln インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: リレーショナル / キーバリュー / ドキュメントの各バックエンド
//! - **データベースレジストリ**: 名前付きバックエンドの登録・引き当て・一括ライフサイクル
//! - **スコープ付きセッション**: コミット/ロールバックを自動で行う作業単位
//! - **キャッシュ接続**: Redis への接続管理
//!
//! ## 依存関係
//!
//! ```text
//! api → infra → shared
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - バックエンド種別の判定と各マネージャー実装
//! - [`registry`] - 名前付きデータベースのレジストリ
//! - [`redis`] - Redis 接続管理
//! - [`security`] - トークン生成・ハッシュ
//! - [`error`] - インフラ層エラー定義
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use kiln_infra::{DatabaseRegistry, db};
//!
//! async fn setup() -> Result<Arc<DatabaseRegistry>, kiln_infra::InfraError> {
//!     let mut registry = DatabaseRegistry::new();
//!     registry.register("main", db::open_manager("main", db::DEFAULT_SQLITE_URL)?)?;
//!     registry.connect_all().await;
//!     Ok(Arc::new(registry))
//! }
//! ```

pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod redis;
pub mod registry;
pub mod security;

pub use db::{DatabaseKind, DatabaseManager, DbSession};
pub use error::{InfraError, InfraErrorKind};
pub use registry::{ConnectionReport, DatabaseRegistry, SessionFuture};
