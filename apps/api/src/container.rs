//! # サービスコンテナ
//!
//! プロセス内で共有するサービスを名前で管理する。
//!
//! ## ライフサイクル
//!
//! 1. 起動前に [`register`](ServiceContainer::register) /
//!    [`register_stateful`](ServiceContainer::register_stateful) でファクトリを登録する
//! 2. [`startup`](ServiceContainer::startup) が登録順にステートフルサービスを構築・初期化する
//! 3. ハンドラーは [`get`](ServiceContainer::get) で型付きの `Arc` を受け取る。
//!    ステートレスサービスは初回アクセス時に構築される
//! 4. [`shutdown`](ServiceContainer::shutdown) が構築の逆順で後片付けする
//!
//! 各サービスは `OnceLock` で一度だけ構築され、以後は同一インスタンスを返す。

use std::{
    any::Any,
    collections::BTreeMap,
    sync::{
        Arc,
        Mutex,
        OnceLock,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use kiln_infra::DatabaseRegistry;
use kiln_shared::health::{ComponentHealth, HealthReport};
use thiserror::Error;

use crate::{
    config::Settings,
    service::{CacheService, ExampleService, Service, ServiceError, StatefulService},
};

/// 1 サービスあたりのヘルスチェックのタイムアウト
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// コンテナ操作のエラー
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("サービス '{0}' は登録されていません")]
    NotRegistered(String),

    #[error("サービス '{0}' は既に登録されています")]
    Duplicate(&'static str),

    #[error("サービス '{0}' は初期化されていません")]
    NotReady(&'static str),

    #[error("サービス '{0}' は要求された型ではありません")]
    TypeMismatch(&'static str),

    /// 起動時の初期化失敗（プロセスは起動を中止する）
    #[error("サービス '{name}' の初期化に失敗しました: {source}")]
    Startup {
        name:   &'static str,
        #[source]
        source: ServiceError,
    },
}

impl ContainerError {
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::NotRegistered(_) | Self::TypeMismatch(_))
    }
}

/// サービスの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Stateless,
    Stateful,
}

/// [`ServiceContainer::shutdown`] の結果
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// 後片付けに成功したサービス（実行順）
    pub cleaned: Vec<&'static str>,
    /// 後片付けに失敗したサービスとエラー
    pub failed:  Vec<(&'static str, ServiceError)>,
}

impl ShutdownReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

type Factory = Box<dyn Fn(Arc<Settings>) -> Constructed + Send + Sync>;

/// 構築済みのインスタンス
///
/// 型付きアクセス用の `Any` と、ライフサイクル操作用のトレイトオブジェクトは
/// 同じ `Arc` を指す。
struct Constructed {
    any:      Arc<dyn Any + Send + Sync>,
    stateful: Option<Arc<dyn StatefulService>>,
}

struct Entry {
    name:    &'static str,
    kind:    ServiceKind,
    factory: Factory,
    cell:    OnceLock<Constructed>,
    ready:   AtomicBool,
    cleaned: AtomicBool,
}

/// プロセス全体で共有するサービスコンテナ
pub struct ServiceContainer {
    settings:           Arc<Settings>,
    /// 登録順
    entries:            Vec<Entry>,
    /// 構築順（`entries` のインデックス）
    construction_order: Mutex<Vec<usize>>,
    /// startup / shutdown の直列化
    lifecycle:          tokio::sync::Mutex<()>,
}

impl ServiceContainer {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            entries: Vec::new(),
            construction_order: Mutex::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// ステートレスサービスを登録する
    pub fn register<T, F>(&mut self, name: &'static str, factory: F) -> Result<(), ContainerError>
    where
        T: Service,
        F: Fn(Arc<Settings>) -> T + Send + Sync + 'static,
    {
        self.insert(
            name,
            ServiceKind::Stateless,
            Box::new(move |settings| Constructed {
                any:      Arc::new(factory(settings)),
                stateful: None,
            }),
        )
    }

    /// ステートフルサービスを登録する
    pub fn register_stateful<T, F>(
        &mut self,
        name: &'static str,
        factory: F,
    ) -> Result<(), ContainerError>
    where
        T: StatefulService,
        F: Fn(Arc<Settings>) -> T + Send + Sync + 'static,
    {
        self.insert(
            name,
            ServiceKind::Stateful,
            Box::new(move |settings| {
                let service = Arc::new(factory(settings));
                Constructed {
                    any:      service.clone(),
                    stateful: Some(service),
                }
            }),
        )
    }

    fn insert(
        &mut self,
        name: &'static str,
        kind: ServiceKind,
        factory: Factory,
    ) -> Result<(), ContainerError> {
        if self.position(name).is_some() {
            return Err(ContainerError::Duplicate(name));
        }
        self.entries.push(Entry {
            name,
            kind,
            factory,
            cell: OnceLock::new(),
            ready: AtomicBool::new(false),
            cleaned: AtomicBool::new(false),
        });
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }

    /// 登録済みのサービス名（登録順）
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn kind(&self, name: &str) -> Option<ServiceKind> {
        self.position(name).map(|idx| self.entries[idx].kind)
    }

    /// 構築済みのサービス名（構築順）
    pub fn construction_order(&self) -> Vec<&'static str> {
        self.construction_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|&idx| self.entries[idx].name)
            .collect()
    }

    /// 未構築ならファクトリで構築する
    fn instance(&self, idx: usize) -> &Constructed {
        let entry = &self.entries[idx];
        entry.cell.get_or_init(|| {
            let constructed = (entry.factory)(Arc::clone(&self.settings));
            self.construction_order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(idx);
            tracing::debug!(service = entry.name, "サービスを構築しました");
            constructed
        })
    }

    /// サービスを型付きで取得する
    ///
    /// ステートフルサービスは初期化に成功するまで [`ContainerError::NotReady`] を返す。
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Send + Sync + 'static,
    {
        let idx = self
            .position(name)
            .ok_or_else(|| ContainerError::NotRegistered(name.to_string()))?;
        let entry = &self.entries[idx];
        if entry.kind == ServiceKind::Stateful && !entry.ready.load(Ordering::Acquire) {
            return Err(ContainerError::NotReady(entry.name));
        }

        Arc::clone(&self.instance(idx).any)
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch(entry.name))
    }

    pub fn examples(&self) -> Result<Arc<ExampleService>, ContainerError> {
        self.get("examples")
    }

    pub fn cache(&self) -> Result<Arc<CacheService>, ContainerError> {
        self.get("cache")
    }

    /// 全ステートフルサービスを登録順に構築・初期化する
    ///
    /// 最初の失敗で中断し、そのエラーを返す。失敗したサービスは ready にならない。
    /// 成功済みのサービスは再初期化しない。
    pub async fn startup(&self) -> Result<(), ContainerError> {
        let _guard = self.lifecycle.lock().await;

        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.kind != ServiceKind::Stateful || entry.ready.load(Ordering::Acquire) {
                continue;
            }
            let Some(service) = self.instance(idx).stateful.clone() else {
                continue;
            };

            tracing::info!(service = entry.name, "サービスを初期化します");
            if let Err(source) = service.initialize().await {
                tracing::error!(
                    service = entry.name,
                    error = %source,
                    "サービスの初期化に失敗しました"
                );
                return Err(ContainerError::Startup {
                    name: entry.name,
                    source,
                });
            }
            entry.cleaned.store(false, Ordering::Release);
            entry.ready.store(true, Ordering::Release);
        }

        tracing::info!(services = self.entries.len(), "サービスコンテナを起動しました");
        Ok(())
    }

    /// 構築済みのステートフルサービスを構築の逆順で後片付けする
    ///
    /// 各サービスにつき一度だけ `cleanup` を呼ぶ。失敗はログに出力して続行する。
    pub async fn shutdown(&self) -> ShutdownReport {
        let _guard = self.lifecycle.lock().await;
        let order = self
            .construction_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut report = ShutdownReport::default();
        for idx in order.into_iter().rev() {
            let entry = &self.entries[idx];
            let Some(service) = entry.cell.get().and_then(|c| c.stateful.clone()) else {
                continue;
            };
            if entry.cleaned.swap(true, Ordering::AcqRel) {
                continue;
            }
            entry.ready.store(false, Ordering::Release);

            match service.cleanup().await {
                Ok(()) => {
                    tracing::info!(service = entry.name, "サービスを停止しました");
                    report.cleaned.push(entry.name);
                }
                Err(e) => {
                    tracing::error!(
                        service = entry.name,
                        error = %e,
                        "サービスの後片付けに失敗しました"
                    );
                    report.failed.push((entry.name, e));
                }
            }
        }
        report
    }

    /// 構築済みのステートフルサービスとデータベースの状態を集約する
    ///
    /// 各プローブは個別のタスクで実行する。パニック・タイムアウトは `error` として扱い、
    /// この関数自体は失敗しない。
    pub async fn health_snapshot(&self, registry: &DatabaseRegistry) -> HealthReport {
        let probes: Vec<_> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let service = entry.cell.get()?.stateful.clone()?;
                let required = service.required();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(HEALTH_CHECK_TIMEOUT, service.health_check()).await
                });
                Some((entry.name, required, handle))
            })
            .collect();

        let mut components: BTreeMap<String, ComponentHealth> = BTreeMap::new();
        for (name, required, handle) in probes {
            let health = match handle.await {
                Ok(Ok(health)) => health,
                Ok(Err(_)) => {
                    tracing::warn!(service = name, "ヘルスチェックがタイムアウトしました");
                    ComponentHealth::error("ヘルスチェックがタイムアウトしました")
                }
                Err(e) => {
                    tracing::error!(service = name, error = %e, "ヘルスチェックが異常終了しました");
                    ComponentHealth::error("ヘルスチェックが異常終了しました")
                }
            };
            components.insert(format!("service:{name}"), health.with_required(required));
        }
        components.extend(registry.health_components().await);

        HealthReport::aggregate(components)
    }
}
