//! # アプリケーション状態
//!
//! ハンドラーが `State` で受け取る共有状態。起動時に一度だけ組み立てる。

use std::sync::Arc;

use kiln_infra::DatabaseRegistry;

use crate::{config::Settings, container::ServiceContainer};

#[derive(Clone)]
pub struct AppState {
    pub settings:  Arc<Settings>,
    pub container: Arc<ServiceContainer>,
    pub registry:  Arc<DatabaseRegistry>,
}

impl AppState {
    pub fn new(container: Arc<ServiceContainer>, registry: Arc<DatabaseRegistry>) -> Self {
        Self {
            settings: Arc::clone(container.settings()),
            container,
            registry,
        }
    }
}
