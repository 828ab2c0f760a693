//! Upstream catalog documents.
//!
//! Only the fields the mirror consumes are modeled; everything else in the
//! upstream JSON is ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use vsx_core::error::CoreError;
use vsx_core::target_platform::is_version_alias;
use vsx_core::types::Timestamp;
use vsx_db::models::extension::UpdateExtensionMetadata;
use vsx_db::models::namespace::UpdateNamespaceMetadata;
use vsx_db::models::user::CreateUser;

/// One extension version as described by the upstream registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub target_platform: Option<String>,
    /// UTC publish time, e.g. `2024-03-01T12:00:00.123456Z`.
    pub timestamp: String,
    /// Resource links keyed by kind (`download`, `signature`, `publicKey`, …).
    #[serde(default)]
    pub files: HashMap<String, String>,
    /// Every version of the extension for this platform, keyed by version
    /// string. Includes alias keys such as `latest`.
    #[serde(default)]
    pub all_versions: BTreeMap<String, String>,
    #[serde(default)]
    pub published_by: Option<PublisherInfo>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<i64>,
    #[serde(default)]
    pub download_count: Option<i64>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    #[serde(default)]
    pub downloadable: Option<bool>,
}

/// Profile of the user who published a version upstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherInfo {
    pub provider: String,
    pub login_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

/// Upstream namespace profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDetails {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub support_link: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub extensions: Vec<serde_json::Value>,
}

impl CatalogEntry {
    pub fn file(&self, kind: &str) -> Option<&str> {
        self.files.get(kind).map(String::as_str)
    }

    /// Concrete version strings, alias keys removed.
    pub fn upstream_versions(&self) -> BTreeSet<String> {
        self.all_versions
            .keys()
            .filter(|version| !is_version_alias(version))
            .cloned()
            .collect()
    }

    pub fn published_at(&self) -> Result<Timestamp, CoreError> {
        parse_upstream_timestamp(&self.timestamp)
    }

    /// `namespace.name-version[@platform]` for logs.
    pub fn to_log_format(&self) -> String {
        match self.target_platform.as_deref() {
            Some(platform) if platform != "universal" => format!(
                "{}.{}-{}@{}",
                self.namespace, self.name, self.version, platform
            ),
            _ => format!("{}.{}-{}", self.namespace, self.name, self.version),
        }
    }

    pub fn extension_metadata(&self) -> UpdateExtensionMetadata {
        UpdateExtensionMetadata {
            average_rating: self.average_rating,
            review_count: self.review_count,
            download_count: self.download_count,
            deprecated: self.deprecated,
            downloadable: self.downloadable,
        }
    }
}

impl PublisherInfo {
    pub fn to_create_user(&self) -> CreateUser {
        CreateUser {
            provider: self.provider.clone(),
            login_name: self.login_name.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
            homepage: self.homepage.clone(),
        }
    }
}

impl NamespaceDetails {
    pub fn to_update(&self) -> UpdateNamespaceMetadata {
        UpdateNamespaceMetadata {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            website: self.website.clone(),
            support_link: self.support_link.clone(),
            logo_url: self.logo.clone(),
            extension_count: i32::try_from(self.extensions.len()).ok(),
        }
    }
}

/// Parse an upstream UTC timestamp. Accepts RFC 3339 and the zone-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` form, which is read as UTC.
pub fn parse_upstream_timestamp(value: &str) -> Result<Timestamp, CoreError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| CoreError::Upstream(format!("Invalid upstream timestamp: '{value}'")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
