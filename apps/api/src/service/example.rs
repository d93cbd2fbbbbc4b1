//! # サンプルサービス
//!
//! サンプルエンドポイントが使うアイテムカタログ。状態を持たない。
//!
//! 実データの代わりに固定の 20 件を返す。新しいサービスを作る際の雛形として使う。

use std::{cmp::Ordering, sync::Arc};

use kiln_shared::pagination::Pagination;
use serde::Serialize;
use serde_json::json;
use strum::{EnumString, IntoStaticStr, VariantNames};

use super::{Service, ServiceError};
use crate::config::{Environment, Settings};

/// サンプルカタログの件数
const CATALOGUE_SIZE: u32 = 20;

/// カタログの全アイテムに付く作成日時
const CATALOGUE_CREATED_AT: &str = "2024-01-01T00:00:00Z";

/// カタログのアイテム
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleItem {
    pub id:         u32,
    pub name:       String,
    pub created_at: String,
}

/// 並び替えのキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, IntoStaticStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
    Id,
    Name,
    #[default]
    CreatedAt,
}

/// 並び順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, IntoStaticStr, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortField {
    /// クエリ文字列から解釈する（未指定はデフォルト）
    pub fn parse_param(value: Option<&str>) -> Result<Self, ServiceError> {
        parse_choice("sort_by", value)
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl SortOrder {
    /// クエリ文字列から解釈する（未指定はデフォルト）
    pub fn parse_param(value: Option<&str>) -> Result<Self, ServiceError> {
        parse_choice("sort_order", value)
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

fn parse_choice<T>(field: &str, value: Option<&str>) -> Result<T, ServiceError>
where
    T: Default + VariantNames + std::str::FromStr,
{
    let Some(value) = value else {
        return Ok(T::default());
    };
    value.parse().map_err(|_| {
        ServiceError::validation(
            format!("{field} に指定できない値です: {value}"),
            json!({ "field": field, "value": value, "allowed": T::VARIANTS }),
        )
    })
}

/// 並び替え・切り出し済みの 1 ページ
#[derive(Debug, Clone)]
pub struct ItemPage {
    pub items:      Vec<ExampleItem>,
    pub total:      usize,
    pub pagination: Pagination,
    pub sort_by:    SortField,
    pub sort_order: SortOrder,
}

/// サンプルアイテムを提供するステートレスサービス
pub struct ExampleService {
    settings: Arc<Settings>,
}

impl ExampleService {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    pub fn environment(&self) -> Environment {
        self.settings.environment
    }

    /// カタログ全件（id 昇順）
    pub fn catalogue(&self) -> Vec<ExampleItem> {
        (1..=CATALOGUE_SIZE)
            .map(|id| ExampleItem {
                id,
                name: format!("Item {id}"),
                created_at: CATALOGUE_CREATED_AT.to_string(),
            })
            .collect()
    }

    /// 並び替えてからページを切り出す
    ///
    /// 並び替えは安定ソートのため、キーが等しいアイテムは id 昇順のまま残る。
    pub fn list_items(
        &self,
        pagination: Pagination,
        sort_by: SortField,
        sort_order: SortOrder,
    ) -> ItemPage {
        let mut items = self.catalogue();
        items.sort_by(|a, b| {
            let ordering = compare(a, b, sort_by);
            match sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        ItemPage {
            total: items.len(),
            items: pagination.slice(&items).to_vec(),
            pagination,
            sort_by,
            sort_order,
        }
    }

    pub fn find_item(&self, id: u32) -> Result<ExampleItem, ServiceError> {
        self.catalogue()
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("アイテム {id} が見つかりません")))
    }
}

fn compare(a: &ExampleItem, b: &ExampleItem, field: SortField) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Name => a.name.cmp(&b.name),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

impl Service for ExampleService {
    fn name(&self) -> &'static str {
        "examples"
    }
}
