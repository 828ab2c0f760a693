//! Namespace membership model. Any membership grants publish permission.

use serde::Serialize;
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_CONTRIBUTOR: &str = "contributor";

/// A row from the `namespace_memberships` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NamespaceMembership {
    pub id: DbId,
    pub namespace_id: DbId,
    pub user_id: DbId,
    pub role: String,
    pub created_at: Timestamp,
}
