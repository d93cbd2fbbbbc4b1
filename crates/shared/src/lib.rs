//! # Kiln 共有ユーティリティ
//!
//! このクレートは、Kiln ワークスペース全体で使用される共通型とユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - 他のすべてのクレート（infra, api）から依存される
//! - ビジネスロジックを含まない純粋なデータ構造と関数のみを配置
//! - axum への依存は持たない（`IntoResponse` 変換は各アプリの責務）
//! - tracing 初期化などの重い依存は `observability` feature の背後に置く

pub mod error_response;
pub mod health;
pub mod observability;
pub mod pagination;

pub use error_response::ErrorResponse;
pub use health::{CheckStatus, ComponentHealth, HealthReport, OverallStatus};
pub use pagination::{PaginatedResponse, Pagination};
