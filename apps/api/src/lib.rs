//! # Kiln API サーバー
//!
//! HTTP API の雛形。設定読み込み・サービスコンテナ・データベースレジストリ・
//! ヘルスチェック・エラーレスポンスを axum の上に組み立てる。
//!
//! ## 起動の流れ
//!
//! ```text
//! .env → Settings → tracing → DatabaseRegistry::connect_all
//!      → ServiceContainer::startup → Router → serve
//!      → (SIGINT / SIGTERM) → ServiceContainer::shutdown → DatabaseRegistry::shutdown
//! ```
//!
//! ## モジュール構成
//!
//! - [`config`] - アプリケーション設定（環境変数からの読み込み）
//! - [`service`] - サービスの基盤トレイトとサンプルサービス
//! - [`container`] - サービスコンテナ（遅延構築・ライフサイクル・ヘルス集約）
//! - [`bootstrap`] - 設定からレジストリ・コンテナを組み立てる
//! - [`error`] - API エラー定義と HTTP レスポンスへの変換
//! - [`extractor`] - 認証エクストラクター
//! - [`handler`] - HTTP リクエストハンドラ
//! - [`middleware`] - リクエスト単位のミドルウェア
//! - [`app_builder`] - ルーターとミドルウェアの組み立て
//!
//! ## 依存関係
//!
//! - `kiln_infra`: データベース接続・レジストリ・Redis 接続
//! - `kiln_shared`: エラーレスポンス・ヘルス集約・オブザーバビリティ

pub mod app_builder;
pub mod bootstrap;
pub mod config;
pub mod container;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod middleware;
pub mod service;
pub mod state;
