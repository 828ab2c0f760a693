//! Extension version model and the insert DTO used when publishing.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};
use vsx_core::TargetPlatform;

/// A row from the `extension_versions` table.
///
/// Identity is `(extension_id, version, target_platform)`. Descriptive
/// fields are immutable once inserted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExtensionVersion {
    pub id: DbId,
    pub extension_id: DbId,
    pub version: String,
    #[sqlx(try_from = "String")]
    pub target_platform: TargetPlatform,
    pub pre_release: bool,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub repository: Option<String>,
    pub bugs: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub bundled_extensions: Vec<String>,
    pub engines: Vec<String>,
    pub timestamp: Timestamp,
    pub published_with: Option<DbId>,
    pub active: bool,
    pub potentially_malicious: bool,
    pub signature_key_pair_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// Everything needed to insert a version. The owning extension is created
/// on the fly when it does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExtensionVersion {
    pub namespace_id: DbId,
    pub extension_name: String,
    pub version: String,
    pub target_platform: TargetPlatform,
    pub pre_release: bool,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub repository: Option<String>,
    pub bugs: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub bundled_extensions: Vec<String>,
    pub engines: Vec<String>,
    pub timestamp: Timestamp,
    pub published_with: Option<DbId>,
    pub signature_key_pair_id: Option<DbId>,
}
