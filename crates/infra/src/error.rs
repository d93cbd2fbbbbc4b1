//! # インフラ層エラー定義
//!
//! データベースや外部サービスとの通信で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **エラーの変換**: sqlx::Error, redis::RedisError などをラップ
//! - **ログ可能性**: Debug によりログ出力時に詳細情報を表示
//! - **SpanTrace 自動捕捉**: `From` 実装や convenience constructor で
//!   エラー生成時の呼び出し経路を自動記録する
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別（Database, Redis, NotRegistered 等）

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別（[`InfraErrorKind`]）と [`SpanTrace`]（呼び出し経路）を保持する。
///
/// ## パターンマッチ
///
/// ```ignore
/// match error.kind() {
///     InfraErrorKind::NotRegistered(name) => { /* 登録漏れ */ }
///     _ => { /* その他 */ }
/// }
/// ```
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、制約違反など。
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// Redis エラー
    #[error("Redis エラー: {0}")]
    Redis(#[source] redis::RedisError),

    /// MongoDB エラー
    #[cfg(feature = "mongodb")]
    #[error("MongoDB エラー: {0}")]
    Mongo(#[source] mongodb::error::Error),

    /// 設定エラー
    ///
    /// 接続 URL の形式不正、未対応スキーム、登録名の重複など。
    /// 起動時に検出され、プロセスの起動を中止させる。
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// 未登録のデータベース名が指定された
    ///
    /// プログラミングエラーとして扱い、リトライしない。
    #[error("データベース '{0}' は登録されていません")]
    NotRegistered(String),

    /// バックエンドが対応していない操作
    #[error("データベース '{name}' は {operation} に対応していません")]
    Unsupported {
        /// データベース名
        name:      String,
        /// 要求された操作（例: "session"）
        operation: &'static str,
    },

    /// 未接続のデータベースに対する操作
    #[error("データベース '{0}' は接続されていません")]
    NotConnected(String),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

// ===== InfraError のメソッド =====

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// InfraError を分解して InfraErrorKind と SpanTrace を取り出す
    pub fn into_parts(self) -> (InfraErrorKind, SpanTrace) {
        (self.kind, self.span_trace)
    }

    /// 種別から InfraError を生成し、現在のスパンを記録する
    fn capture(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    /// 登録名の引き当てに失敗したエラーかどうか
    pub fn is_lookup(&self) -> bool {
        matches!(self.kind, InfraErrorKind::NotRegistered(_))
    }

    /// 設定エラーかどうか
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, InfraErrorKind::Configuration(_))
    }

    // ===== Convenience constructors =====

    /// 設定エラーを生成する
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Configuration(msg.into()))
    }

    /// 未登録エラーを生成する
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::NotRegistered(name.into()))
    }

    /// 未対応操作エラーを生成する
    pub fn unsupported(name: impl Into<String>, operation: &'static str) -> Self {
        Self::capture(InfraErrorKind::Unsupported {
            name: name.into(),
            operation,
        })
    }

    /// 未接続エラーを生成する
    pub fn not_connected(name: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::NotConnected(name.into()))
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Unexpected(msg.into()))
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// ===== From 実装（SpanTrace 自動キャプチャ） =====

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self::capture(InfraErrorKind::Database(source))
    }
}

impl From<redis::RedisError> for InfraError {
    fn from(source: redis::RedisError) -> Self {
        Self::capture(InfraErrorKind::Redis(source))
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for InfraError {
    fn from(source: mongodb::error::Error) -> Self {
        Self::capture(InfraErrorKind::Mongo(source))
    }
}
