//! Registry user model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};

/// A row from the `users` table. `(provider, login_name)` is unique.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub provider: String,
    pub login_name: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub homepage: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub provider: String,
    pub login_name: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub homepage: Option<String>,
}
