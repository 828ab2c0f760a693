//! Personal access token model.

use serde::Serialize;
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};

/// A row from the `access_tokens` table.
///
/// **Note:** `value` is the bearer secret and is never serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessToken {
    pub id: DbId,
    pub user_id: DbId,
    #[serde(skip_serializing)]
    pub value: String,
    pub description: String,
    pub active: bool,
    pub created_at: Timestamp,
    pub accessed_at: Option<Timestamp>,
}
