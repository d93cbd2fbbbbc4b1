//! # ミドルウェア
//!
//! axum の `from_fn` で組み込むリクエスト単位のミドルウェア。

mod request_id;

#[cfg(test)]
pub(crate) use request_id::scope_request_id;
pub use request_id::{current_request_id, store_request_id};
