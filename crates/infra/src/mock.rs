//! # テスト用モックデータベース
//!
//! 実際の接続を持たない [`DatabaseManager`] 実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! kiln-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{
    db::{DatabaseKind, DatabaseManager},
    error::InfraError,
};

/// `health_check` の振る舞い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProbe {
    /// 接続状態と `set_healthy` に従う
    Normal,
    /// パニックする
    Panic,
    /// 完了しない
    Hang,
}

/// 接続・切断の呼び出し回数を記録するモック
pub struct MockDatabase {
    name:             String,
    kind:             DatabaseKind,
    connected:        AtomicBool,
    healthy:          AtomicBool,
    fail_connect:     bool,
    fail_disconnect:  bool,
    probe:            MockProbe,
    connect_calls:    AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl MockDatabase {
    /// 正常に接続できるリレーショナル DB のモック
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:             name.into(),
            kind:             DatabaseKind::Relational,
            connected:        AtomicBool::new(false),
            healthy:          AtomicBool::new(true),
            fail_connect:     false,
            fail_disconnect:  false,
            probe:            MockProbe::Normal,
            connect_calls:    AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_kind(mut self, kind: DatabaseKind) -> Self {
        self.kind = kind;
        self
    }

    /// connect が常に失敗する
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// disconnect が常に失敗する
    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    /// health_check の振る舞いを差し替える
    pub fn with_probe(mut self, probe: MockProbe) -> Self {
        self.probe = probe;
        self
    }

    /// 接続済みでもヘルスチェックの結果を切り替える
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseManager for MockDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), InfraError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(InfraError::unexpected(format!("{}: テスト用接続エラー", self.name)));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), InfraError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(InfraError::unexpected(format!("{}: テスト用切断エラー", self.name)));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.probe {
            MockProbe::Normal => self.is_connected() && self.healthy.load(Ordering::SeqCst),
            MockProbe::Panic => panic!("{}: テスト用ヘルスチェックのパニック", self.name),
            MockProbe::Hang => std::future::pending().await,
        }
    }
}
