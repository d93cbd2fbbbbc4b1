//! # 認証エクストラクター
//!
//! `Authorization: Bearer <token>` ヘッダーから利用者を解決する。
//!
//! トークン検証は雛形のため実装していない。空でないトークンであれば
//! 固定のプレースホルダー利用者として扱う。実運用ではここで JWT 検証や
//! セッション照会に置き換える。

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use kiln_infra::security::hash_string;
use serde::Serialize;

use crate::error::ApiError;

/// 認証済みの利用者
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id:       String,
    pub username: String,
    pub email:    String,
}

impl User {
    fn placeholder() -> Self {
        Self {
            id:       "user123".to_string(),
            username: "testuser".to_string(),
            email:    "test@example.com".to_string(),
        }
    }
}

/// Bearer トークンを取り出す（スキーム名は大文字小文字を区別しない）
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// ログに残すためのトークン指紋（SHA-256 の先頭 12 桁）
fn token_fingerprint(token: &str) -> String {
    let mut digest = hash_string(token);
    digest.truncate(12);
    digest
}

fn resolve_user(parts: &Parts) -> Option<User> {
    let token = bearer_token(parts)?;
    tracing::debug!(token = %token_fingerprint(token), "Bearer トークンを受け付けました");
    Some(User::placeholder())
}

/// 任意認証: 資格情報がなければ `None`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_user(parts)))
    }
}

/// 必須認証: 資格情報がなければ 401
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve_user(parts)
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("認証が必要です".to_string()))
    }
}
