//! Namespace model: the publisher scope extensions are published under.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};

/// A row from the `namespaces` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Namespace {
    pub id: DbId,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub support_link: Option<String>,
    pub logo_url: Option<String>,
    pub extension_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Descriptive fields copied from an upstream registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNamespaceMetadata {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub support_link: Option<String>,
    pub logo_url: Option<String>,
    pub extension_count: Option<i32>,
}
