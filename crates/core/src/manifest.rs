//! Package manifest types and metadata validation.
//!
//! The manifest is parsed from `extension/package.json` inside a `.vsix`
//! archive; the target platform and pre-release flag come from the
//! accompanying `extension.vsixmanifest` (see [`crate::archive`]).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::ValidateUrl;

use crate::error::CoreError;
use crate::naming::VersionCoordinates;
use crate::target_platform::TargetPlatform;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of short free-text fields (display name, license, tags).
pub const MAX_SHORT_FIELD_LENGTH: usize = 255;

/// Maximum length of the description.
pub const MAX_DESCRIPTION_LENGTH: usize = 2048;

/// Maximum number of keywords (tags).
pub const MAX_TAGS: usize = 30;

static GALLERY_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Manifest types
// ---------------------------------------------------------------------------

/// A URL-valued manifest field, given either as a string or as `{ "url": … }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlField {
    Plain(String),
    Object { url: String },
}

impl UrlField {
    pub fn url(&self) -> &str {
        match self {
            UrlField::Plain(url) => url,
            UrlField::Object { url } => url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryBanner {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

/// Parsed package manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Namespace the package is published under.
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub repository: Option<UrlField>,
    #[serde(default)]
    pub bugs: Option<UrlField>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub extension_dependencies: Vec<String>,
    #[serde(default)]
    pub extension_pack: Vec<String>,
    #[serde(default)]
    pub engines: BTreeMap<String, String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub gallery_banner: Option<GalleryBanner>,
    /// Read from the vsixmanifest, not from package.json.
    #[serde(skip)]
    pub target_platform: TargetPlatform,
    /// Read from the vsixmanifest, not from package.json.
    #[serde(skip)]
    pub pre_release: bool,
}

impl PackageManifest {
    /// Parse the JSON contents of `package.json`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CoreError::InvalidArtifact(format!("Invalid package.json: {e}")))
    }

    pub fn coordinates(&self) -> VersionCoordinates {
        VersionCoordinates::new(
            &self.publisher,
            &self.name,
            &self.version,
            self.target_platform,
        )
    }

    /// Display name with blank values normalized to `None`.
    pub fn normalized_display_name(&self) -> Option<String> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn repository_url(&self) -> Option<String> {
        self.repository.as_ref().map(|r| r.url().to_string())
    }

    pub fn bugs_url(&self) -> Option<String> {
        self.bugs.as_ref().map(|b| b.url().to_string())
    }

    /// Engines flattened to `name@range` entries, e.g. `vscode@^1.80.0`.
    pub fn engine_list(&self) -> Vec<String> {
        self.engines
            .iter()
            .map(|(engine, range)| format!("{engine}@{range}"))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the descriptive metadata of a manifest.
///
/// Returns every issue found, in field order. An empty list means valid.
pub fn validate_metadata(manifest: &PackageManifest) -> Vec<String> {
    let mut issues = Vec::new();

    if let Some(display_name) = manifest.normalized_display_name() {
        check_text(&mut issues, "displayName", &display_name, MAX_SHORT_FIELD_LENGTH);
    }
    if let Some(description) = &manifest.description {
        check_text(&mut issues, "description", description, MAX_DESCRIPTION_LENGTH);
    }
    if let Some(license) = &manifest.license {
        check_text(&mut issues, "license", license, MAX_SHORT_FIELD_LENGTH);
    }

    if let Some(homepage) = &manifest.homepage {
        check_url(&mut issues, "homepage", homepage);
    }
    if let Some(repository) = manifest.repository_url() {
        check_url(&mut issues, "repository", &repository);
    }
    if let Some(bugs) = manifest.bugs_url() {
        check_url(&mut issues, "bugs", &bugs);
    }

    for category in &manifest.categories {
        check_text(&mut issues, "categories", category, MAX_SHORT_FIELD_LENGTH);
    }

    if manifest.keywords.len() > MAX_TAGS {
        issues.push(format!(
            "Too many keywords: {} (at most {MAX_TAGS} are allowed)",
            manifest.keywords.len()
        ));
    }
    for keyword in &manifest.keywords {
        check_text(&mut issues, "keywords", keyword, MAX_SHORT_FIELD_LENGTH);
    }

    if let Some(color) = manifest
        .gallery_banner
        .as_ref()
        .and_then(|banner| banner.color.as_deref())
    {
        if !GALLERY_COLOR.is_match(color) {
            issues.push(format!("Invalid gallery banner color: '{color}'"));
        }
    }
    if let Some(theme) = manifest
        .gallery_banner
        .as_ref()
        .and_then(|banner| banner.theme.as_deref())
    {
        if theme != "light" && theme != "dark" {
            issues.push(format!(
                "Invalid gallery banner theme: '{theme}'. Valid themes: light, dark"
            ));
        }
    }

    for (engine, range) in &manifest.engines {
        if engine.trim().is_empty() || range.trim().is_empty() {
            issues.push(format!("Invalid engine entry: '{engine}@{range}'"));
        }
    }

    issues
}

fn check_text(issues: &mut Vec<String>, field: &str, value: &str, max_len: usize) {
    if value.chars().count() > max_len {
        issues.push(format!(
            "The field '{field}' exceeds the current limit of {max_len} characters."
        ));
    }
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        issues.push(format!("Invalid characters found in field '{field}'."));
    }
}

fn check_url(issues: &mut Vec<String>, field: &str, value: &str) {
    if !value.to_string().validate_url() {
        issues.push(format!("Invalid URL in field '{field}': {value}"));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
