//! File resource kinds and the in-memory descriptor produced while
//! materializing a version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Resource kind constants as stored in `file_resources.kind` and used as
/// keys of an upstream catalog's file map.
pub const KIND_DOWNLOAD: &str = "download";
pub const KIND_SIGNATURE: &str = "signature";
pub const KIND_PUBLIC_KEY: &str = "publicKey";
pub const KIND_CHECKSUM: &str = "sha256";
pub const KIND_MANIFEST: &str = "manifest";
pub const KIND_README: &str = "readme";
pub const KIND_CHANGELOG: &str = "changelog";
pub const KIND_LICENSE: &str = "license";
pub const KIND_ICON: &str = "icon";
pub const KIND_VSIXMANIFEST: &str = "vsixmanifest";
pub const KIND_RESOURCE: &str = "resource";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    Download,
    Signature,
    PublicKey,
    Checksum,
    Manifest,
    Readme,
    Changelog,
    License,
    Icon,
    VsixManifest,
    /// Any other archive entry.
    Resource,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Download => KIND_DOWNLOAD,
            ResourceKind::Signature => KIND_SIGNATURE,
            ResourceKind::PublicKey => KIND_PUBLIC_KEY,
            ResourceKind::Checksum => KIND_CHECKSUM,
            ResourceKind::Manifest => KIND_MANIFEST,
            ResourceKind::Readme => KIND_README,
            ResourceKind::Changelog => KIND_CHANGELOG,
            ResourceKind::License => KIND_LICENSE,
            ResourceKind::Icon => KIND_ICON,
            ResourceKind::VsixManifest => KIND_VSIXMANIFEST,
            ResourceKind::Resource => KIND_RESOURCE,
        }
    }

    /// Kinds of which a version may hold at most one.
    pub fn is_singular(self) -> bool {
        matches!(self, ResourceKind::Download | ResourceKind::Signature)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            KIND_DOWNLOAD => ResourceKind::Download,
            KIND_SIGNATURE => ResourceKind::Signature,
            KIND_PUBLIC_KEY => ResourceKind::PublicKey,
            KIND_CHECKSUM => ResourceKind::Checksum,
            KIND_MANIFEST => ResourceKind::Manifest,
            KIND_README => ResourceKind::Readme,
            KIND_CHANGELOG => ResourceKind::Changelog,
            KIND_LICENSE => ResourceKind::License,
            KIND_ICON => ResourceKind::Icon,
            KIND_VSIXMANIFEST => ResourceKind::VsixManifest,
            KIND_RESOURCE => ResourceKind::Resource,
            other => {
                return Err(CoreError::InvalidIdentifier(format!(
                    "Unknown resource kind: '{other}'"
                )))
            }
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(value: ResourceKind) -> Self {
        value.as_str().to_string()
    }
}

/// A resource derived from an artifact, not yet attached to a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBlob {
    pub kind: ResourceKind,
    pub name: String,
    pub content: Vec<u8>,
}

impl ResourceBlob {
    pub fn new(kind: ResourceKind, name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            kind,
            name: name.into(),
            content,
        }
    }
}
