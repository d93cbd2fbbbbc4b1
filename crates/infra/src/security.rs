//! # セキュリティユーティリティ
//!
//! 認証方式に依存しない汎用的なヘルパー。
//!
//! ```rust
//! use kiln_infra::security::{generate_token, hash_string};
//!
//! // 本番用 SECRET_KEY の候補（32 文字以上になる）
//! let secret = generate_token(32);
//! assert!(secret.len() >= 32);
//!
//! // トークンそのものではなく指紋を保存・ログ出力する
//! assert_eq!(hash_string(&secret).len(), 64);
//! ```

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore as _;
use sha2::{Digest, Sha256};

/// URL セーフな暗号論的乱数トークンを生成する
///
/// `nbytes` バイトの乱数を base64url（パディングなし）でエンコードする。
/// 出力長はおよそ `nbytes * 4 / 3` 文字になる。
pub fn generate_token(nbytes: usize) -> String {
    let mut bytes = vec![0u8; nbytes];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 文字列の SHA-256 ハッシュを 16 進文字列で返す
pub fn hash_string(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
