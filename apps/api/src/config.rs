//! # アプリケーション設定
//!
//! 環境変数からアプリケーション設定を読み込み、検証する。
//!
//! ## 設計方針
//!
//! [12-Factor App](https://12factor.net/ja/config) の原則に従い、
//! すべての設定を環境変数から読み込む。起動時に一度だけ構築し、
//! 以後は `Arc<Settings>` として読み取り専用で共有する。
//!
//! 値の取得元は関数として注入できる（[`Settings::from_lookup`]）。
//! テストではプロセスの環境変数を書き換えずに検証できる。
//!
//! ## 環境変数一覧
//!
//! | 変数名 | デフォルト | 説明 |
//! |--------|------------|------|
//! | `APP_NAME` | `Kiln API` | アプリケーション名 |
//! | `APP_VERSION` | クレートのバージョン | アプリケーションのバージョン |
//! | `ENVIRONMENT` | `development` | `development` / `staging` / `production` |
//! | `DEBUG` | `false` | デバッグモード |
//! | `HOST` | `0.0.0.0` | バインドアドレス |
//! | `PORT` | `8000` | ポート番号（1〜65535） |
//! | `SECRET_KEY` | 開発用の固定値 | 32 文字以上。本番では固定値を拒否する |
//! | `ALLOWED_HOSTS` | `*` | CORS 許可オリジン（カンマ区切りまたは JSON 配列） |
//! | `LOG_LEVEL` | `info` | `trace` / `debug` / `info` / `warn` / `error` |
//! | `LOG_FORMAT` | `pretty` | `json` / `pretty`（`text` は `pretty` の別名） |
//! | `API_V1_PREFIX` | `/api/v1` | `/` で始まること |
//! | `DOCS_URL` | `/docs` | 空文字で無効化。本番では公開しない |
//! | `USE_DATABASE` | `false` | データベース接続の有効化 |
//! | `DATABASE_URL` | なし | 未設定なら組み込み SQLite を使う |
//! | `CACHE_URL` | なし | 設定するとキャッシュサービスを有効化 |
//! | `EXTERNAL_API_KEY` | なし | 外部 API のキー |

use std::fmt;

use kiln_shared::observability::LogFormat;
use serde::Serialize;
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;

/// `SECRET_KEY` 未設定時の開発用固定値
pub const DEV_SECRET_KEY: &str = "your-secret-key-change-in-production";

/// `SECRET_KEY` の最小長
const SECRET_KEY_MIN_LEN: usize = 32;

/// 設定の読み込み・検証エラー
///
/// いずれもプロセスの起動を中止させる。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 値の形式または範囲が不正
    #[error("{key} の値が不正です: {reason}")]
    Invalid {
        key:    &'static str,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// 実行環境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ログレベル
///
/// `warning` / `critical` も受け付ける。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum LogLevel {
    #[strum(serialize = "trace")]
    Trace,
    #[strum(serialize = "debug")]
    Debug,
    #[strum(serialize = "info")]
    Info,
    #[strum(serialize = "warn", serialize = "warning")]
    Warn,
    #[strum(serialize = "error", serialize = "critical")]
    Error,
}

impl LogLevel {
    /// EnvFilter ディレクティブとして使う文字列
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// ログに出さないシークレット値
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

/// アプリケーション全体の設定
///
/// 起動時に一度だけ構築し、以後は変更しない。
#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name:         String,
    pub app_version:      String,
    pub environment:      Environment,
    pub debug:            bool,
    pub host:             String,
    pub port:             u16,
    pub secret_key:       SecretKey,
    /// CORS 許可オリジン（`*` は全許可）
    pub allowed_hosts:    Vec<String>,
    pub log_level:        LogLevel,
    pub log_format:       LogFormat,
    /// 末尾の `/` を除いた API v1 のパスプレフィックス
    pub api_v1_prefix:    String,
    pub docs_url:         Option<String>,
    pub use_database:     bool,
    pub database_url:     Option<String>,
    pub cache_url:        Option<String>,
    pub external_api_key: Option<String>,
}

impl Settings {
    /// プロセスの環境変数から設定を読み込む
    ///
    /// `.env` の読み込みは呼び出し側（`main`）で済ませておくこと。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から設定を読み込む
    ///
    /// 空文字（前後の空白を除く）は未設定として扱う。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let environment = match get("ENVIRONMENT") {
            Some(value) => value.parse().map_err(|_| {
                ConfigError::invalid(
                    "ENVIRONMENT",
                    format!("development / staging / production のいずれかを指定してください: {value}"),
                )
            })?,
            None => Environment::Development,
        };

        let secret_key = get("SECRET_KEY").unwrap_or_else(|| DEV_SECRET_KEY.to_string());
        if secret_key.chars().count() < SECRET_KEY_MIN_LEN {
            return Err(ConfigError::invalid(
                "SECRET_KEY",
                format!("{SECRET_KEY_MIN_LEN} 文字以上が必要です"),
            ));
        }
        if environment == Environment::Production && secret_key == DEV_SECRET_KEY {
            return Err(ConfigError::invalid(
                "SECRET_KEY",
                "本番環境では開発用の固定値を使用できません",
            ));
        }

        let log_level = match get("LOG_LEVEL") {
            Some(value) => value.parse().map_err(|_| {
                ConfigError::invalid("LOG_LEVEL", format!("未対応のログレベルです: {value}"))
            })?,
            None => LogLevel::Info,
        };

        Ok(Self {
            app_name: get("APP_NAME").unwrap_or_else(|| "Kiln API".to_string()),
            app_version: get("APP_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            environment,
            debug: parse_bool("DEBUG", get("DEBUG"))?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_port(get("PORT"))?,
            secret_key: SecretKey(secret_key),
            allowed_hosts: parse_allowed_hosts(get("ALLOWED_HOSTS"))?,
            log_level,
            log_format: parse_log_format(get("LOG_FORMAT"))?,
            api_v1_prefix: parse_prefix(get("API_V1_PREFIX"))?,
            docs_url: match lookup("DOCS_URL") {
                Some(value) if value.trim().is_empty() => None,
                Some(value) => Some(value.trim().to_string()),
                None => Some("/docs".to_string()),
            },
            use_database: parse_bool("USE_DATABASE", get("USE_DATABASE"))?,
            database_url: get("DATABASE_URL"),
            cache_url: get("CACHE_URL"),
            external_api_key: get("EXTERNAL_API_KEY"),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// 公開するドキュメント URL（本番環境では常に `None`）
    pub fn public_docs_url(&self) -> Option<&str> {
        if self.is_production() {
            None
        } else {
            self.docs_url.as_deref()
        }
    }

    /// すべてのオリジンを許可するか
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_hosts.iter().any(|host| host == "*")
    }

    /// `host:port` 形式のバインドアドレス
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("真偽値ではありません: {value}"))),
    }
}

fn parse_port(value: Option<String>) -> Result<u16, ConfigError> {
    let Some(value) = value else {
        return Ok(8000);
    };
    match value.parse::<u16>() {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(ConfigError::invalid(
            "PORT",
            format!("1〜65535 の整数を指定してください: {value}"),
        )),
    }
}

fn parse_log_format(value: Option<String>) -> Result<LogFormat, ConfigError> {
    let Some(value) = value else {
        return Ok(LogFormat::default());
    };
    LogFormat::parse(&value).ok_or_else(|| {
        ConfigError::invalid(
            "LOG_FORMAT",
            format!("json / pretty / text のいずれかを指定してください: {value}"),
        )
    })
}

fn parse_prefix(value: Option<String>) -> Result<String, ConfigError> {
    let Some(value) = value else {
        return Ok("/api/v1".to_string());
    };
    if !value.starts_with('/') {
        return Err(ConfigError::invalid(
            "API_V1_PREFIX",
            format!("'/' で始まる必要があります: {value}"),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// カンマ区切り、または JSON 配列（`["https://a.example", "https://b.example"]`）を受け付ける
fn parse_allowed_hosts(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(value) = value else {
        return Ok(vec!["*".to_string()]);
    };
    let hosts: Vec<String> = if value.starts_with('[') {
        serde_json::from_str(&value)
            .map_err(|e| ConfigError::invalid("ALLOWED_HOSTS", e.to_string()))?
    } else {
        value
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect()
    };
    if hosts.is_empty() {
        return Err(ConfigError::invalid(
            "ALLOWED_HOSTS",
            "1 つ以上のオリジンを指定してください",
        ));
    }
    Ok(hosts)
}
