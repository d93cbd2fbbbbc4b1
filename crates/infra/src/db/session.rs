//! # スコープ付き DB セッション
//!
//! リレーショナル DB のトランザクション 1 つを表す。
//!
//! ## ライフサイクル
//!
//! 1. `DatabaseRegistry::get_session()` または `with_session()` で作成
//! 2. [`DbSession::conn`] でクエリを実行
//! 3. `commit()` でコミット、`rollback()` またはドロップでロールバック
//!
//! `with_session()` を使う場合、コミット・ロールバックはレジストリが行う。

use std::ops::{Deref, DerefMut};

use sqlx::{Any, AnyConnection, Transaction};

use crate::error::InfraError;

/// 1 つの作業単位に属するトランザクション付きセッション
///
/// 複数のリクエストで共有しない。
pub struct DbSession {
    database: String,
    tx:       Transaction<'static, Any>,
}

impl DbSession {
    pub(crate) fn new(database: impl Into<String>, tx: Transaction<'static, Any>) -> Self {
        Self {
            database: database.into(),
            tx,
        }
    }

    /// セッションを開始したデータベース名
    pub fn database(&self) -> &str {
        &self.database
    }

    /// トランザクション内の DB コネクションを取得する
    ///
    /// `sqlx::query(..).execute(session.conn())` の形で使う。
    pub fn conn(&mut self) -> &mut AnyConnection {
        &mut self.tx
    }

    /// トランザクションをコミットする
    pub async fn commit(self) -> Result<(), InfraError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// トランザクションをロールバックする
    pub async fn rollback(self) -> Result<(), InfraError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl Deref for DbSession {
    type Target = AnyConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for DbSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

impl std::fmt::Debug for DbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSession")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_db_sessionはsendを実装している() {
        assert_send::<DbSession>();
    }
}
