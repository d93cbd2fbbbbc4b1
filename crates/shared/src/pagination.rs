//! # ページネーション
//!
//! オフセットベースのページネーション値の正規化と、リスト用レスポンス型を提供する。

use serde::{Deserialize, Serialize};

/// `limit` のデフォルト値
pub const DEFAULT_LIMIT: i64 = 100;

/// `limit` の上限（過大なページ要求を防ぐ）
pub const MAX_LIMIT: i64 = 1000;

/// 正規化済みのページネーション値
///
/// `skip` は 0 以上、`limit` は `1..=max_limit` に収まることが保証される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub skip:  i64,
    pub limit: i64,
}

impl Pagination {
    /// 任意の入力値を安全な範囲に丸める
    pub fn normalize(skip: i64, limit: i64, max_limit: i64) -> Self {
        Self {
            skip:  skip.max(0),
            limit: limit.clamp(1, max_limit.max(1)),
        }
    }

    /// 省略可能なクエリ値から [`MAX_LIMIT`] を上限として正規化する
    pub fn from_query(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self::normalize(
            skip.unwrap_or(0),
            limit.unwrap_or(DEFAULT_LIMIT),
            MAX_LIMIT,
        )
    }

    /// スライスから該当ページを切り出す
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.skip).unwrap_or(usize::MAX).min(items.len());
        let len = usize::try_from(self.limit).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(items.len());
        &items[start..end]
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::from_query(None, None)
    }
}

/// ページネーション付きレスポンス
///
/// ## JSON 形式
///
/// ```json
/// {
///   "items": [...],
///   "total": 20,
///   "skip": 0,
///   "limit": 10
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub skip:  i64,
    pub limit: i64,
}
