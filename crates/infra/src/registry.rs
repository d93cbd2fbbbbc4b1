//! # DatabaseRegistry
//!
//! 名前付きの [`DatabaseManager`] を集約し、一括接続・ヘルスチェック・切断と
//! スコープ付きセッションの取得を提供する。
//!
//! ## ライフサイクル
//!
//! 1. 起動時に `register` / `register_optional` で登録（名前の重複は設定エラー）
//! 2. `connect_all()` で並行接続。個別の失敗はログとレポートに残し、起動は止めない
//! 3. 共有後は `Arc<DatabaseRegistry>` として読み取り専用で扱う
//! 4. 終了時に `shutdown()` で全接続を閉じる（冪等）

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use kiln_shared::ComponentHealth;
use tokio::task::JoinSet;

use crate::{
    db::{DatabaseManager, DbSession},
    error::InfraError,
};

/// 1 データベースあたりのヘルスチェックのタイムアウト
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// `with_session` に渡すクロージャが返す Future
pub type SessionFuture<'c, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>;

/// 登録済みデータベース 1 件
struct RegisteredDatabase {
    manager:  Arc<dyn DatabaseManager>,
    /// 異常時にヘルスチェック全体を `unhealthy` にするか
    required: bool,
}

/// 一括接続・一括切断の結果レポート
///
/// 全マネージャーの実行結果を集約する。部分失敗時も全マネージャーを実行し、
/// 成功/失敗を分けて報告する。
#[derive(Debug, Default)]
pub struct ConnectionReport {
    /// 成功したデータベース名
    pub succeeded: Vec<String>,
    /// 失敗したデータベース名とエラー
    pub failed:    Vec<(String, InfraError)>,
}

impl ConnectionReport {
    /// いずれかのマネージャーが失敗したかどうか
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// 名前付きデータベースのレジストリ
#[derive(Default)]
pub struct DatabaseRegistry {
    databases: BTreeMap<String, RegisteredDatabase>,
}

impl DatabaseRegistry {
    /// 空のレジストリを生成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 必須データベースを登録する
    ///
    /// 同じ名前が登録済みの場合は設定エラーを返す。
    pub fn register(
        &mut self,
        name: impl Into<String>,
        manager: Arc<dyn DatabaseManager>,
    ) -> Result<(), InfraError> {
        self.insert(name.into(), manager, true)
    }

    /// 任意データベースを登録する
    ///
    /// 異常時もヘルスチェック全体は `degraded` に留まる。
    pub fn register_optional(
        &mut self,
        name: impl Into<String>,
        manager: Arc<dyn DatabaseManager>,
    ) -> Result<(), InfraError> {
        self.insert(name.into(), manager, false)
    }

    fn insert(
        &mut self,
        name: String,
        manager: Arc<dyn DatabaseManager>,
        required: bool,
    ) -> Result<(), InfraError> {
        if self.databases.contains_key(&name) {
            return Err(InfraError::configuration(format!(
                "データベース '{name}' は既に登録されています"
            )));
        }
        tracing::debug!(database = %name, kind = %manager.kind(), required, "データベースを登録");
        self.databases
            .insert(name, RegisteredDatabase { manager, required });
        Ok(())
    }

    /// 登録済みデータベース名の一覧を返す（名前順）
    pub fn names(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    /// 名前でマネージャーを取得する
    pub fn get_database(&self, name: &str) -> Result<Arc<dyn DatabaseManager>, InfraError> {
        self.databases
            .get(name)
            .map(|entry| Arc::clone(&entry.manager))
            .ok_or_else(|| InfraError::not_registered(name))
    }

    /// トランザクション付きセッションを開始する
    ///
    /// リレーショナル DB のみ対応。コミット・ロールバックは呼び出し側の責務。
    /// 境界管理を任せたい場合は [`with_session`](Self::with_session) を使う。
    pub async fn get_session(&self, name: &str) -> Result<DbSession, InfraError> {
        self.get_database(name)?.begin().await
    }

    /// スコープ付きの作業単位を実行する
    ///
    /// `f` が `Ok` を返せばコミット、`Err` を返せばロールバックする。
    /// どちらの場合もセッションはこの関数内で閉じられる。
    ///
    /// ```rust,ignore
    /// registry
    ///     .with_session("main", |session| {
    ///         Box::pin(async move {
    ///             sqlx::query("INSERT INTO items (name) VALUES ('a')")
    ///                 .execute(session.conn())
    ///                 .await?;
    ///             Ok::<_, InfraError>(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_session<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut DbSession) -> SessionFuture<'c, T, E>,
        T: Send,
        E: From<InfraError> + Send,
    {
        let mut session = self.get_session(name).await?;
        match f(&mut session).await {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = session.rollback().await {
                    tracing::warn!(
                        database = %name,
                        error = %rollback_error,
                        "ロールバックに失敗しました"
                    );
                }
                Err(error)
            }
        }
    }

    /// 全データベースに並行して接続する
    ///
    /// 接続済みのものはスキップする。個別の失敗はログに出力してレポートに含め、
    /// エラーとしては返さない。
    pub async fn connect_all(&self) -> ConnectionReport {
        if self.databases.is_empty() {
            tracing::info!("データベースが未設定のため接続をスキップします");
            return ConnectionReport::default();
        }

        tracing::info!(count = self.databases.len(), "データベースに接続します");
        let report = self
            .run_all(
                |manager| !manager.is_connected(),
                |manager| async move { manager.connect().await },
            )
            .await;

        for (name, error) in &report.failed {
            tracing::error!(database = %name, error = %error, "データベース接続に失敗");
        }
        tracing::info!(
            connected = self.connected_count(),
            total = self.databases.len(),
            "データベースの初期化が完了しました"
        );
        report
    }

    /// 全データベースの疎通を並行して確認する
    ///
    /// 失敗しない。各プローブは個別のタスクで [`HEALTH_CHECK_TIMEOUT`] 付きで実行し、
    /// パニック・タイムアウトは `false` として扱う。
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let mut results: BTreeMap<String, bool> = self
            .databases
            .keys()
            .map(|name| (name.clone(), false))
            .collect();

        let mut probes = JoinSet::new();
        for (name, entry) in &self.databases {
            let name = name.clone();
            let manager = Arc::clone(&entry.manager);
            probes.spawn(async move {
                let outcome = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, manager.health_check()).await;
                (name, outcome)
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((name, Ok(healthy))) => {
                    results.insert(name, healthy);
                }
                Ok((name, Err(_))) => {
                    tracing::warn!(database = %name, "ヘルスチェックがタイムアウトしました");
                }
                Err(join_error) => {
                    tracing::warn!(error = %join_error, "ヘルスチェックが異常終了しました");
                }
            }
        }
        results
    }

    /// ヘルスレポート用のコンポーネント状態を返す
    ///
    /// キーは `database:{name}`。必須フラグは登録時の指定に従う。
    pub async fn health_components(&self) -> BTreeMap<String, ComponentHealth> {
        let results = self.health_check_all().await;
        results
            .into_iter()
            .map(|(name, healthy)| {
                let required = self
                    .databases
                    .get(&name)
                    .is_some_and(|entry| entry.required);
                (
                    format!("database:{name}"),
                    ComponentHealth::from_probe(healthy).with_required(required),
                )
            })
            .collect()
    }

    /// 接続中の全データベースを切断する
    ///
    /// 冪等。個別の失敗はログに出力し、残りの切断を続ける。
    pub async fn shutdown(&self) -> ConnectionReport {
        let report = self
            .run_all(
                |manager| manager.is_connected(),
                |manager| async move { manager.disconnect().await },
            )
            .await;

        for (name, error) in &report.failed {
            tracing::error!(database = %name, error = %error, "データベース切断に失敗");
        }
        if !report.succeeded.is_empty() {
            tracing::info!(count = report.succeeded.len(), "データベース接続を閉じました");
        }
        report
    }

    fn connected_count(&self) -> usize {
        self.databases
            .values()
            .filter(|entry| entry.manager.is_connected())
            .count()
    }

    /// 条件に合うマネージャーに対して操作を並行実行し、結果を集約する
    async fn run_all<P, F, Fut>(&self, predicate: P, op: F) -> ConnectionReport
    where
        P: Fn(&dyn DatabaseManager) -> bool,
        F: Fn(Arc<dyn DatabaseManager>) -> Fut,
        Fut: Future<Output = Result<(), InfraError>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for (name, entry) in &self.databases {
            if !predicate(entry.manager.as_ref()) {
                continue;
            }
            let name = name.clone();
            let fut = op(Arc::clone(&entry.manager));
            tasks.spawn(async move { (name, fut.await) });
        }

        let mut report = ConnectionReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => report.succeeded.push(name),
                Ok((name, Err(error))) => report.failed.push((name, error)),
                Err(join_error) => {
                    tracing::error!(error = %join_error, "データベース操作タスクが異常終了しました");
                }
            }
        }
        report.succeeded.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("databases", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        db::DatabaseKind,
        error::InfraErrorKind,
        mock::{MockDatabase, MockProbe},
    };

    #[test]
    fn test_空のレジストリのnamesは空vecを返す() {
        let registry = DatabaseRegistry::new();
        assert!(registry.names().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_登録した名前をnamesで取得できる() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register("main", Arc::new(MockDatabase::new("main")))
            .unwrap();
        registry
            .register_optional("analytics", Arc::new(MockDatabase::new("analytics")))
            .unwrap();

        assert_eq!(registry.names(), vec!["analytics", "main"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_重複した名前の登録は設定エラー() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register("main", Arc::new(MockDatabase::new("main")))
            .unwrap();

        let err = registry
            .register_optional("main", Arc::new(MockDatabase::new("main")))
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_未登録の名前のget_databaseはnot_registered() {
        let registry = DatabaseRegistry::new();

        let err = registry.get_database("nonexistent").err().unwrap();

        assert!(matches!(err.kind(), InfraErrorKind::NotRegistered(name) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn test_未登録の名前のget_sessionはnot_registered() {
        let registry = DatabaseRegistry::new();
        let err = registry.get_session("main").await.unwrap_err();
        assert!(err.is_lookup());
    }

    #[tokio::test]
    async fn test_非リレーショナルdbのget_sessionはunsupported() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register(
                "cache",
                Arc::new(MockDatabase::new("cache").with_kind(DatabaseKind::KeyValue)),
            )
            .unwrap();

        let err = registry.get_session("cache").await.unwrap_err();

        assert!(matches!(err.kind(), InfraErrorKind::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_データベースなしのconnect_allとhealth_check_allは空を返す() {
        let registry = DatabaseRegistry::new();

        let report = registry.connect_all().await;
        let health = registry.health_check_all().await;

        assert!(!report.has_failures());
        assert!(report.succeeded.is_empty());
        assert!(health.is_empty());
    }

    #[tokio::test]
    async fn test_connect_allで1つが失敗しても残りは接続される() {
        let main = Arc::new(MockDatabase::new("main"));
        let broken = Arc::new(MockDatabase::new("broken").failing_connect());
        let mut registry = DatabaseRegistry::new();
        registry.register("main", main.clone()).unwrap();
        registry.register_optional("broken", broken.clone()).unwrap();

        let report = registry.connect_all().await;

        assert_eq!(report.succeeded, vec!["main".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert!(main.is_connected());
        assert!(!broken.is_connected());
    }

    #[tokio::test]
    async fn test_connect_allは接続済みのマネージャーをスキップする() {
        let main = Arc::new(MockDatabase::new("main"));
        let mut registry = DatabaseRegistry::new();
        registry.register("main", main.clone()).unwrap();

        registry.connect_all().await;
        let report = registry.connect_all().await;

        assert!(report.succeeded.is_empty());
        assert_eq!(main.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_health_check_allはdb毎の結果を返す() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register("main", Arc::new(MockDatabase::new("main")))
            .unwrap();
        registry
            .register_optional(
                "analytics",
                Arc::new(MockDatabase::new("analytics").failing_connect()),
            )
            .unwrap();
        registry.connect_all().await;

        let health = registry.health_check_all().await;

        assert!(health["main"]);
        assert!(!health["analytics"]);
    }

    #[tokio::test]
    async fn test_接続後に不調になったdbはhealth_check_allでfalse() {
        let main = Arc::new(MockDatabase::new("main"));
        let mut registry = DatabaseRegistry::new();
        registry.register("main", main.clone()).unwrap();
        registry.connect_all().await;
        assert!(registry.health_check_all().await["main"]);

        main.set_healthy(false);

        assert!(!registry.health_check_all().await["main"]);
        assert!(main.is_connected());
    }

    #[tokio::test]
    async fn test_ヘルスチェックがパニックしても他のdbの結果は返る() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register(
                "main",
                Arc::new(MockDatabase::new("main").with_probe(MockProbe::Panic)),
            )
            .unwrap();
        registry
            .register_optional("analytics", Arc::new(MockDatabase::new("analytics")))
            .unwrap();
        registry.connect_all().await;

        let health = registry.health_check_all().await;

        assert_eq!(health.len(), 2);
        assert!(!health["main"]);
        assert!(health["analytics"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_応答しないヘルスチェックはタイムアウトでfalse() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register(
                "main",
                Arc::new(MockDatabase::new("main").with_probe(MockProbe::Hang)),
            )
            .unwrap();
        registry.connect_all().await;
        let started = tokio::time::Instant::now();

        let components = registry.health_components().await;

        assert!(!components["database:main"].is_ok());
        assert!(started.elapsed() >= HEALTH_CHECK_TIMEOUT);
        assert!(started.elapsed() < HEALTH_CHECK_TIMEOUT * 2);
    }

    #[tokio::test]
    async fn test_health_componentsは必須フラグを反映する() {
        let mut registry = DatabaseRegistry::new();
        registry
            .register("main", Arc::new(MockDatabase::new("main")))
            .unwrap();
        registry
            .register_optional("analytics", Arc::new(MockDatabase::new("analytics")))
            .unwrap();

        let components = registry.health_components().await;

        assert!(components["database:main"].required);
        assert!(!components["database:analytics"].required);
        assert!(!components["database:main"].is_ok());
    }

    #[tokio::test]
    async fn test_shutdownは接続中のdbのみ切断し冪等() {
        let main = Arc::new(MockDatabase::new("main"));
        let idle = Arc::new(MockDatabase::new("idle").failing_connect());
        let mut registry = DatabaseRegistry::new();
        registry.register("main", main.clone()).unwrap();
        registry.register_optional("idle", idle.clone()).unwrap();
        registry.connect_all().await;

        let first = registry.shutdown().await;
        let second = registry.shutdown().await;

        assert_eq!(first.succeeded, vec!["main".to_string()]);
        assert!(second.succeeded.is_empty());
        assert_eq!(main.disconnect_calls(), 1);
        assert_eq!(idle.disconnect_calls(), 0);
        assert!(!main.is_connected());
    }

    #[tokio::test]
    async fn test_shutdownで切断失敗してもレポートに残り例外にならない() {
        let main = Arc::new(MockDatabase::new("main").failing_disconnect());
        let other = Arc::new(MockDatabase::new("other"));
        let mut registry = DatabaseRegistry::new();
        registry.register("main", main.clone()).unwrap();
        registry.register_optional("other", other.clone()).unwrap();
        registry.connect_all().await;

        let report = registry.shutdown().await;

        assert!(report.has_failures());
        assert_eq!(report.failed[0].0, "main");
        assert_eq!(report.succeeded, vec!["other".to_string()]);
    }
}
