//! Target platform identifiers.
//!
//! A version is qualified by at most one platform; platform-less packages
//! are stored as [`TargetPlatform::Universal`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Version keys in an upstream catalog that name another version rather
/// than being one.
pub const VERSION_ALIASES: &[&str] = &["latest", "pre-release"];

/// Whether `version` is an alias key such as `latest`.
pub fn is_version_alias(version: &str) -> bool {
    VERSION_ALIASES.contains(&version)
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum TargetPlatform {
    Win32X64,
    Win32Ia32,
    Win32Arm64,
    LinuxX64,
    LinuxArm64,
    LinuxArmhf,
    AlpineX64,
    AlpineArm64,
    DarwinX64,
    DarwinArm64,
    Web,
    #[default]
    Universal,
}

impl TargetPlatform {
    /// Every platform, in the order upstream catalogs are scanned.
    pub const ALL: [TargetPlatform; 12] = [
        TargetPlatform::Win32X64,
        TargetPlatform::Win32Ia32,
        TargetPlatform::Win32Arm64,
        TargetPlatform::LinuxX64,
        TargetPlatform::LinuxArm64,
        TargetPlatform::LinuxArmhf,
        TargetPlatform::AlpineX64,
        TargetPlatform::AlpineArm64,
        TargetPlatform::DarwinX64,
        TargetPlatform::DarwinArm64,
        TargetPlatform::Web,
        TargetPlatform::Universal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetPlatform::Win32X64 => "win32-x64",
            TargetPlatform::Win32Ia32 => "win32-ia32",
            TargetPlatform::Win32Arm64 => "win32-arm64",
            TargetPlatform::LinuxX64 => "linux-x64",
            TargetPlatform::LinuxArm64 => "linux-arm64",
            TargetPlatform::LinuxArmhf => "linux-armhf",
            TargetPlatform::AlpineX64 => "alpine-x64",
            TargetPlatform::AlpineArm64 => "alpine-arm64",
            TargetPlatform::DarwinX64 => "darwin-x64",
            TargetPlatform::DarwinArm64 => "darwin-arm64",
            TargetPlatform::Web => "web",
            TargetPlatform::Universal => "universal",
        }
    }

    pub fn is_universal(self) -> bool {
        self == TargetPlatform::Universal
    }

    /// Parse an optional platform tag; absent or empty means universal.
    pub fn from_optional(value: Option<&str>) -> Result<Self, CoreError> {
        match value.map(str::trim) {
            None | Some("") => Ok(TargetPlatform::Universal),
            Some(s) => s.parse(),
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetPlatform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetPlatform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                CoreError::InvalidIdentifier(format!(
                    "Unsupported target platform '{s}'. Supported: {}",
                    TargetPlatform::ALL.map(TargetPlatform::as_str).join(", ")
                ))
            })
    }
}

impl TryFrom<String> for TargetPlatform {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetPlatform> for String {
    fn from(value: TargetPlatform) -> Self {
        value.as_str().to_string()
    }
}
