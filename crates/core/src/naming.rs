//! Identifier rules and canonical names for extensions and their files.
//!
//! Covers extension name / version validation, `namespace.name` id parsing,
//! and the log and file-name formats derived from version coordinates.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::target_platform::{is_version_alias, TargetPlatform};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of an extension name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of a version string.
pub const MAX_VERSION_LENGTH: usize = 100;

/// File extension of a packaged extension archive.
pub const ARCHIVE_EXTENSION: &str = ".vsix";

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-+$~]+$").expect("valid name pattern"));

static SEMVER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*)?(?:\+[0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*)?$",
    )
    .expect("valid semver pattern")
});

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an extension name against the naming rules.
pub fn validate_extension_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::InvalidIdentifier(
            "Name must not be empty.".into(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::InvalidIdentifier(format!(
            "The extension name exceeds the current limit of {MAX_NAME_LENGTH} characters."
        )));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(CoreError::InvalidIdentifier(format!(
            "Invalid extension name: {name}"
        )));
    }
    Ok(())
}

/// Validate a version string: non-empty, not an alias, semantic-version shaped.
pub fn validate_extension_version(version: &str) -> Result<(), CoreError> {
    if version.is_empty() {
        return Err(CoreError::InvalidIdentifier(
            "Version must not be empty.".into(),
        ));
    }
    if version.chars().count() > MAX_VERSION_LENGTH {
        return Err(CoreError::InvalidIdentifier(format!(
            "The version string exceeds the current limit of {MAX_VERSION_LENGTH} characters."
        )));
    }
    if is_version_alias(version) {
        return Err(CoreError::InvalidIdentifier(format!(
            "The version string '{version}' is reserved."
        )));
    }
    if !SEMVER_PATTERN.is_match(version) {
        return Err(CoreError::InvalidIdentifier(format!(
            "The version string '{version}' does not follow semantic versioning."
        )));
    }
    Ok(())
}

/// Split a `namespace.name` id into its two parts.
///
/// `field` names the manifest field the id came from and appears in the
/// error message.
pub fn parse_extension_id<'a>(id: &'a str, field: &str) -> Result<(&'a str, &'a str), CoreError> {
    let mut parts = id.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace, name))
        }
        _ => Err(CoreError::InvalidIdentifier(format!(
            "Invalid '{field}' format. Expected: '${{namespace}}.${{name}}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// The identity of one published version: `namespace.name`, version and platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionCoordinates {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub target_platform: TargetPlatform,
}

impl VersionCoordinates {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        target_platform: TargetPlatform,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            target_platform,
        }
    }

    /// `namespace.name`
    pub fn extension_id(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Human-readable form used in logs and error messages, e.g.
    /// `acme.tool-1.2.0@linux-x64` (platform omitted when universal).
    pub fn to_log_format(&self) -> String {
        let mut out = format!("{}.{}-{}", self.namespace, self.name, self.version);
        if !self.target_platform.is_universal() {
            out.push('@');
            out.push_str(self.target_platform.as_str());
        }
        out
    }

    /// Canonical archive file name, e.g. `acme.tool-1.2.0@linux-x64.vsix`.
    pub fn download_file_name(&self) -> String {
        format!("{}{ARCHIVE_EXTENSION}", self.to_log_format())
    }
}

/// Strip the archive extension from a download file name.
pub fn download_stem(file_name: &str) -> &str {
    file_name.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(file_name)
}

/// The last `/`-separated segment of a URL path.
pub fn last_path_segment(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
