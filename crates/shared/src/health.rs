//! # ヘルスチェック共通型
//!
//! ヘルスエンドポイントが返す複合レポートと、その集約ロジックを提供する。
//!
//! ## 集約ルール
//!
//! | 条件 | 全体ステータス |
//! |------|----------------|
//! | 全コンポーネントが `ok` | `healthy` |
//! | 必須コンポーネントのいずれかが `error` | `unhealthy` |
//! | 任意コンポーネントのみ `error` | `degraded` |
//!
//! [`HealthReport::aggregate`] は収集済みのステータスを読むだけの純粋関数であり、
//! 接続試行などの副作用は持たない。プローブの実行は呼び出し元の責務。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 個別チェックの結果ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// チェック成功
    Ok,
    /// チェック失敗
    Error,
}

/// 全体のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// 全コンポーネントが正常
    Healthy,
    /// 任意コンポーネントの一部が異常
    Degraded,
    /// 必須コンポーネントが異常
    Unhealthy,
}

/// 1 コンポーネント分のヘルス情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status:   CheckStatus,
    /// 異常時に全体を `unhealthy` にするか
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail:   Option<String>,
}

impl ComponentHealth {
    /// 正常な必須コンポーネント
    pub fn ok() -> Self {
        Self {
            status:   CheckStatus::Ok,
            required: true,
            detail:   None,
        }
    }

    /// 異常な必須コンポーネント
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status:   CheckStatus::Error,
            required: true,
            detail:   Some(detail.into()),
        }
    }

    /// bool のプローブ結果から生成する
    pub fn from_probe(healthy: bool) -> Self {
        if healthy {
            Self::ok()
        } else {
            Self::error("probe failed")
        }
    }

    /// 必須フラグを上書きする
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// ヘルスチェックの複合レポート
///
/// リクエストごとに構築される読み取り専用のスナップショット。永続化しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status:     OverallStatus,
    /// キー: コンポーネント名（例: `"database:main"`, `"service:cache"`）
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthReport {
    /// 収集済みのコンポーネント状態から全体ステータスを決定する
    ///
    /// コンポーネントが 1 つもない場合は `healthy` とする。
    pub fn aggregate(components: BTreeMap<String, ComponentHealth>) -> Self {
        let status = classify(components.values());
        Self { status, components }
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == OverallStatus::Unhealthy
    }
}

fn classify<'a>(components: impl Iterator<Item = &'a ComponentHealth>) -> OverallStatus {
    let mut status = OverallStatus::Healthy;
    for component in components {
        if component.is_ok() {
            continue;
        }
        if component.required {
            return OverallStatus::Unhealthy;
        }
        status = OverallStatus::Degraded;
    }
    status
}
