//! File resources attached to an extension version.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};

/// Content is stored in the `content` column.
pub const STORAGE_DATABASE: &str = "database";

/// No content stored; the file is read back out of the download archive.
pub const STORAGE_ARCHIVE: &str = "archive";

/// A row from the `file_resources` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileResource {
    pub id: DbId,
    pub extension_version_id: DbId,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub content: Option<Vec<u8>>,
    pub storage: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileResource {
    pub extension_version_id: DbId,
    pub kind: String,
    pub name: String,
    pub content: Option<Vec<u8>>,
    pub storage: String,
}

/// A resource for a version that is written in the same transaction.
#[derive(Debug, Clone)]
pub struct NewFileResource {
    pub kind: String,
    pub name: String,
    pub content: Option<Vec<u8>>,
    pub storage: String,
}

impl NewFileResource {
    pub fn for_version(&self, extension_version_id: DbId) -> CreateFileResource {
        CreateFileResource {
            extension_version_id,
            kind: self.kind.clone(),
            name: self.name.clone(),
            content: self.content.clone(),
            storage: self.storage.clone(),
        }
    }
}
