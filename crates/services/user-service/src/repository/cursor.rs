//! Opaque pagination cursors.
//!
//! A cursor is the store's continuation key, JSON encoded and wrapped in
//! URL-safe base64. The repository never looks inside it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use common::{AppError, AppResult};

use crate::infra::Document;

const INVALID_CURSOR: &str = "An invalid cursor was provided";

/// Turn a continuation key into a cursor token.
pub fn encode_cursor(key: &Document) -> AppResult<String> {
    let json = serde_json::to_vec(key)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Turn a cursor token back into the continuation key it was made from.
pub fn decode_cursor(token: &str) -> AppResult<Document> {
    let json = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| AppError::validation(INVALID_CURSOR))?;
    serde_json::from_slice(&json).map_err(|_| AppError::validation(INVALID_CURSOR))
}
