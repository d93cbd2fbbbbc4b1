//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、処理はコンテナから取得したサービスに委譲する
//!
//! ## モジュール構成
//!
//! ```text
//! handler.rs          # 親モジュール（re-export）
//! └── handler/
//!     ├── example.rs  # サンプルエンドポイント
//!     ├── fallback.rs # 未定義ルート・メソッド
//!     ├── health.rs   # ヘルスチェック
//!     └── info.rs     # API 情報
//! ```

pub mod example;
pub mod fallback;
pub mod health;
pub mod info;

pub use example::{basic_example, get_item, paginated_example, protected_example};
pub use fallback::{method_not_allowed, not_found};
pub use health::health_check;
pub use info::api_info;
