//! Reading `.vsix` extension archives.
//!
//! [`ArtifactResourceExtractor`] opens an archive and produces its logical
//! sub-resources one at a time, so callers can persist each before reading
//! the next one.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::CoreError;
use crate::hashing::sha256_file_hex;
use crate::manifest::PackageManifest;
use crate::naming::{download_stem, last_path_segment};
use crate::resource::{ResourceBlob, ResourceKind};
use crate::target_platform::TargetPlatform;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Directory inside the archive holding the packaged extension.
pub const EXTENSION_DIR: &str = "extension/";

/// Location of the npm-style manifest.
pub const PACKAGE_JSON: &str = "extension/package.json";

/// Location of the VSIX manifest.
pub const VSIX_MANIFEST: &str = "extension.vsixmanifest";

/// Entries whose uncompressed size exceeds their compressed size by more than
/// this factor are treated as compression bombs.
const MAX_COMPRESSION_RATIO: u64 = 100;

/// Compression ratio is only checked for entries at least this large.
const RATIO_CHECK_MIN_SIZE: u64 = 1024 * 1024;

/// Largest single entry read into memory, by declared or actual size.
pub const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

static TARGET_PLATFORM_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"TargetPlatform="([^"]*)""#).expect("valid regex"));

static PRE_RELEASE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Id="Microsoft\.VisualStudio\.Code\.PreRelease"\s+Value="true""#)
        .expect("valid regex")
});

fn zip_error(err: ZipError) -> CoreError {
    CoreError::InvalidArtifact(err.to_string())
}

fn entry_too_large(name: &str, size: u64) -> CoreError {
    CoreError::InvalidArtifact(format!(
        "Archive entry '{name}' is too large ({size} bytes, limit {MAX_ENTRY_SIZE})"
    ))
}

/// Read one entry, refusing anything above [`MAX_ENTRY_SIZE`]. The header
/// size is only checked, never used to size the buffer.
fn read_bounded(name: &str, declared_size: u64, reader: impl Read) -> Result<Vec<u8>, CoreError> {
    if declared_size > MAX_ENTRY_SIZE {
        return Err(entry_too_large(name, declared_size));
    }
    let mut content = Vec::new();
    reader.take(MAX_ENTRY_SIZE + 1).read_to_end(&mut content)?;
    if content.len() as u64 > MAX_ENTRY_SIZE {
        return Err(entry_too_large(name, content.len() as u64));
    }
    Ok(content)
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct ArtifactResourceExtractor {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl ArtifactResourceExtractor {
    /// Open the archive at `path`. Fails with `InvalidArtifact` if the file
    /// is not a readable zip archive.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(zip_error)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    /// Parse `package.json`, completing it with the platform and pre-release
    /// flag declared by the VSIX manifest.
    pub fn manifest(&mut self) -> Result<PackageManifest, CoreError> {
        let package_json = self.read_entry(PACKAGE_JSON)?.ok_or_else(|| {
            CoreError::InvalidArtifact(format!("Missing {PACKAGE_JSON} in extension archive"))
        })?;
        let mut manifest = PackageManifest::from_json(&package_json)?;

        if let Some(vsix_manifest) = self.read_entry(VSIX_MANIFEST)? {
            let text = String::from_utf8_lossy(&vsix_manifest);
            let platform = TARGET_PLATFORM_ATTR
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str());
            manifest.target_platform = TargetPlatform::from_optional(platform)?;
            manifest.pre_release = PRE_RELEASE_PROPERTY.is_match(&text);
        }

        Ok(manifest)
    }

    /// Whether the archive shows signs of tampering: an entry path escaping
    /// the archive root, or a compression bomb.
    pub fn is_potentially_malicious(&mut self) -> Result<bool, CoreError> {
        for i in 0..self.archive.len() {
            let entry = self.archive.by_index_raw(i).map_err(zip_error)?;
            if entry.enclosed_name().is_none() || entry.name().contains('\0') {
                tracing::warn!(entry = entry.name(), "Archive entry escapes the archive root");
                return Ok(true);
            }
            let compressed = entry.compressed_size().max(1);
            if entry.size() >= RATIO_CHECK_MIN_SIZE
                && entry.size() / compressed > MAX_COMPRESSION_RATIO
            {
                tracing::warn!(
                    entry = entry.name(),
                    size = entry.size(),
                    compressed,
                    "Archive entry exceeds the compression ratio limit"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of raw entries; valid indices for [`Self::resource_at`].
    pub fn entry_count(&self) -> usize {
        self.archive.len()
    }

    /// The entry at `index` as a generic resource, or `None` when it is a
    /// directory or lies outside the `extension/` folder.
    pub fn resource_at(&mut self, index: usize) -> Result<Option<ResourceBlob>, CoreError> {
        let mut entry = self.archive.by_index(index).map_err(zip_error)?;
        if entry.is_dir() {
            return Ok(None);
        }
        let Some(name) = entry.name().strip_prefix(EXTENSION_DIR).map(str::to_string) else {
            return Ok(None);
        };
        let size = entry.size();
        let content = read_bounded(&name, size, &mut entry)?;
        Ok(Some(ResourceBlob::new(ResourceKind::Resource, name, content)))
    }

    /// The logical files the package declares: manifest, VSIX manifest,
    /// readme, changelog, license and icon (whichever are present).
    pub fn file_resources(
        &mut self,
        manifest: &PackageManifest,
    ) -> Result<Vec<ResourceBlob>, CoreError> {
        let mut resources = Vec::new();

        if let Some(content) = self.read_entry(PACKAGE_JSON)? {
            resources.push(ResourceBlob::new(ResourceKind::Manifest, "package.json", content));
        }
        if let Some(content) = self.read_entry(VSIX_MANIFEST)? {
            resources.push(ResourceBlob::new(ResourceKind::VsixManifest, VSIX_MANIFEST, content));
        }

        for (kind, stem) in [
            (ResourceKind::Readme, "readme"),
            (ResourceKind::Changelog, "changelog"),
            (ResourceKind::License, "license"),
        ] {
            if let Some(entry_name) = self.find_top_level(stem) {
                if let Some(content) = self.read_entry(&entry_name)? {
                    let name = last_path_segment(&entry_name).to_string();
                    resources.push(ResourceBlob::new(kind, name, content));
                }
            }
        }

        if let Some(icon) = manifest.icon.as_deref() {
            let entry_name = format!("{EXTENSION_DIR}{}", icon.trim_start_matches("./"));
            if let Some(content) = self.read_entry(&entry_name)? {
                let name = last_path_segment(&entry_name).to_string();
                resources.push(ResourceBlob::new(ResourceKind::Icon, name, content));
            }
        }

        Ok(resources)
    }

    /// SHA-256 checksum of the whole archive, named after the download.
    pub fn sha256_checksum(&self, download_name: &str) -> Result<ResourceBlob, CoreError> {
        let digest = sha256_file_hex(&self.path)?;
        Ok(ResourceBlob::new(
            ResourceKind::Checksum,
            format!("{}.sha256", download_stem(download_name)),
            digest.into_bytes(),
        ))
    }

    // ---- private helpers ----

    fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(zip_error(e)),
        };
        let size = entry.size();
        Ok(Some(read_bounded(name, size, &mut entry)?))
    }

    /// First file directly under `extension/` whose lower-cased name starts
    /// with `stem` (`README.md`, `LICENSE.txt`, `CHANGELOG`, …).
    fn find_top_level(&self, stem: &str) -> Option<String> {
        let mut names: Vec<&str> = self
            .archive
            .file_names()
            .filter(|name| {
                name.strip_prefix(EXTENSION_DIR).is_some_and(|rest| {
                    !rest.contains('/') && rest.to_ascii_lowercase().starts_with(stem)
                })
            })
            .collect();
        names.sort_unstable();
        names.first().map(|name| name.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
