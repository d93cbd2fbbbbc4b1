//! # データベース接続管理
//!
//! 名前付きバックエンド 1 つ分の接続を管理する [`DatabaseManager`] と、
//! 接続 URL からバックエンド種別を判定するヘルパーを提供する。
//!
//! ## バックエンド種別
//!
//! | スキーム | 種別 | 実装 |
//! |----------|------|------|
//! | `postgres`, `postgresql`, `mysql`, `sqlite` | [`Relational`](DatabaseKind::Relational) | [`SqlDatabase`]（sqlx `Any`） |
//! | `redis`, `rediss` | [`KeyValue`](DatabaseKind::KeyValue) | [`RedisDatabase`] |
//! | `mongodb`, `mongodb+srv` | [`Document`](DatabaseKind::Document) | `MongoDatabase`（`mongodb` feature） |
//!
//! `postgresql+asyncpg://` のような `+driver` 付きスキームも受け付け、
//! ドライバ指定を取り除いてから接続する。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use kiln_infra::db;
//!
//! let manager = db::open_manager("main", "sqlite://./temp/app.db?mode=rwc")?;
//! manager.connect().await?;
//! assert!(manager.health_check().await);
//! ```

#[cfg(feature = "mongodb")]
mod document;
mod key_value;
mod session;
mod sql;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use derive_more::Display;
#[cfg(feature = "mongodb")]
pub use document::MongoDatabase;
pub use key_value::RedisDatabase;
pub use session::DbSession;
pub use sql::SqlDatabase;

use crate::error::InfraError;

/// DATABASE_URL 未設定時に使う組み込み SQLite ストア
pub const DEFAULT_SQLITE_URL: &str = "sqlite://./temp/app.db?mode=rwc";

/// バックエンドの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DatabaseKind {
    /// トランザクション付きセッションを提供するリレーショナル DB
    #[display("relational")]
    Relational,
    /// キーバリューストア
    #[display("key-value")]
    KeyValue,
    /// ドキュメントストア
    #[display("document")]
    Document,
}

impl DatabaseKind {
    /// 接続 URL のスキームから種別を判定する
    pub fn detect(url: &str) -> Result<Self, InfraError> {
        let scheme = split_scheme(url)?.0;
        if scheme == "mongodb+srv" {
            return Ok(Self::Document);
        }
        match base_scheme(scheme) {
            "postgres" | "postgresql" | "mysql" | "mariadb" | "sqlite" => Ok(Self::Relational),
            "redis" | "rediss" => Ok(Self::KeyValue),
            "mongodb" => Ok(Self::Document),
            other => Err(InfraError::configuration(format!(
                "未対応のデータベーススキームです: {other}"
            ))),
        }
    }
}

/// 名前付きバックエンド 1 つ分の接続を管理する trait
///
/// 実装は内部可変性で接続状態を保持し、`&self` のまま接続・切断できる。
/// レジストリが `Arc<dyn DatabaseManager>` として所有する。
#[async_trait]
pub trait DatabaseManager: Send + Sync {
    /// マネージャー名（ログ出力用）
    fn name(&self) -> &str;

    /// バックエンド種別
    fn kind(&self) -> DatabaseKind;

    /// 接続済みかどうか
    fn is_connected(&self) -> bool;

    /// 接続を確立する
    ///
    /// 接続済みの場合は何もしない。
    async fn connect(&self) -> Result<(), InfraError>;

    /// 接続を閉じる
    ///
    /// 未接続・切断済みの場合は何もしない（冪等）。
    async fn disconnect(&self) -> Result<(), InfraError>;

    /// 軽量な疎通確認を行う
    ///
    /// 失敗はすべて `false` として返し、エラーを伝播しない。
    async fn health_check(&self) -> bool;

    /// トランザクション付きセッションを開始する
    ///
    /// リレーショナル以外のバックエンドは `Unsupported` を返す。
    async fn begin(&self) -> Result<DbSession, InfraError> {
        Err(InfraError::unsupported(self.name(), "session"))
    }
}

/// 接続 URL から種別に応じたマネージャーを生成する
///
/// 接続はまだ行わない。`mongodb` feature が無効な状態で MongoDB の URL を
/// 渡した場合は設定エラーになる。
pub fn open_manager(name: &str, url: &str) -> Result<Arc<dyn DatabaseManager>, InfraError> {
    let url = normalize_url(url)?;
    let manager: Arc<dyn DatabaseManager> = match DatabaseKind::detect(&url)? {
        DatabaseKind::Relational => Arc::new(SqlDatabase::new(name, url)),
        DatabaseKind::KeyValue => Arc::new(RedisDatabase::new(name, url)),
        #[cfg(feature = "mongodb")]
        DatabaseKind::Document => Arc::new(MongoDatabase::new(name, url)),
        #[cfg(not(feature = "mongodb"))]
        DatabaseKind::Document => {
            return Err(InfraError::configuration(format!(
                "データベース '{name}' には mongodb feature が必要です"
            )));
        }
    };
    Ok(manager)
}

/// `+driver` 付きスキームを素のスキームに正規化する
///
/// - `postgresql+asyncpg://host/db` → `postgresql://host/db`
/// - `sqlite+aiosqlite:///./app.db` → `sqlite://./app.db`
///
/// ドライバ指定付きの SQLite URL は `///` で相対パスを表す表記のため、
/// sqlx の表記（`//` の直後がパス）に合わせてスラッシュを 1 つ取り除く。
/// `mongodb+srv` はそれ自体が正式なスキームなのでそのまま返す。
pub fn normalize_url(url: &str) -> Result<String, InfraError> {
    let (scheme, rest) = split_scheme(url)?;
    if scheme == "mongodb+srv" || !scheme.contains('+') {
        return Ok(url.to_owned());
    }

    let base = base_scheme(scheme);
    if base == "sqlite" {
        let path = rest.strip_prefix('/').unwrap_or(rest);
        return Ok(format!("sqlite://{path}"));
    }
    Ok(format!("{base}://{rest}"))
}

/// SQLite URL が指すファイルの親ディレクトリを作成する
///
/// インメモリ DB（`:memory:`）や親ディレクトリを持たないパスでは何もしない。
pub fn ensure_sqlite_dir(url: &str) -> Result<(), InfraError> {
    let Some(path) = sqlite_path(url) else {
        return Ok(());
    };
    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|e| {
        InfraError::configuration(format!(
            "SQLite ディレクトリを作成できません ({}): {e}",
            parent.display()
        ))
    })
}

/// SQLite URL からファイルパス部分を取り出す
fn sqlite_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(path)
    }
}

fn split_scheme(url: &str) -> Result<(&str, &str), InfraError> {
    url.split_once("://")
        .or_else(|| url.strip_prefix("sqlite:").map(|rest| ("sqlite", rest)))
        .ok_or_else(|| InfraError::configuration("接続 URL にスキームがありません"))
}

fn base_scheme(scheme: &str) -> &str {
    scheme.split('+').next().unwrap_or(scheme)
}
