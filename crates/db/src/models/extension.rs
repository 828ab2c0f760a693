//! Extension model: one `namespace.name` package across all its versions.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use vsx_core::types::{DbId, Timestamp};

/// A row from the `extensions` table.
///
/// `active` is true only while at least one version is active.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Extension {
    pub id: DbId,
    pub namespace_id: DbId,
    pub name: String,
    pub public_id: Uuid,
    pub active: bool,
    pub published_date: Timestamp,
    pub last_updated_date: Timestamp,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub download_count: i64,
    pub deprecated: bool,
    pub downloadable: bool,
    pub created_at: Timestamp,
}

/// Popularity and lifecycle fields copied from an upstream registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExtensionMetadata {
    pub average_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub download_count: Option<i64>,
    pub deprecated: Option<bool>,
    pub downloadable: Option<bool>,
}
