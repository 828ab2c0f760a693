//! Publishing a version: synchronous creation, asynchronous materialization.
//!
//! [`PublishPipeline::create_version`] performs every validation read first
//! and then a single atomic write, so a rejected publish leaves nothing
//! behind. [`PublishPipeline::materialize`] rebuilds the version's resources
//! from the archive from scratch on every run, which makes it safe to retry
//! after a partial failure.
//!
//! [`PublishPipeline::mirror`] replays an upstream version: it runs the same
//! validation and writes the version with all its resources in one atomic
//! store call, so a failed replay leaves nothing to skip over next time.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use vsx_core::archive::ArtifactResourceExtractor;
use vsx_core::error::CoreError;
use vsx_core::manifest::{validate_metadata, PackageManifest};
use vsx_core::naming::{
    parse_extension_id, validate_extension_name, validate_extension_version, VersionCoordinates,
};
use vsx_core::resource::{ResourceBlob, ResourceKind};
use vsx_core::signing::IntegrityVerifier;
use vsx_core::types::{DbId, Timestamp};
use vsx_core::TempFileHandle;
use vsx_db::models::access_token::AccessToken;
use vsx_db::models::extension_version::{CreateExtensionVersion, ExtensionVersion};
use vsx_db::models::file_resource::{
    CreateFileResource, NewFileResource, STORAGE_ARCHIVE, STORAGE_DATABASE,
};

use crate::activator::Activator;
use crate::retry::materialize_with_retry;
use crate::store::RegistryStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The download resource of a freshly created version.
#[derive(Debug, Clone)]
pub struct Download {
    pub version: ExtensionVersion,
    pub coordinates: VersionCoordinates,
    pub file_name: String,
}

impl Download {
    /// Download named canonically after the version coordinates.
    pub fn new(version: ExtensionVersion, coordinates: VersionCoordinates) -> Self {
        let file_name = coordinates.download_file_name();
        Self {
            version,
            coordinates,
            file_name,
        }
    }
}

/// How a successful materialization ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// All resources stored and the version activated.
    Activated,
    /// The archive looked tampered with; the version stays inactive.
    Quarantined,
}

/// A version accepted by [`PublishPipeline::publish`], with the handle of its
/// background materialization.
pub struct Publication {
    pub version: ExtensionVersion,
    pub materialization: JoinHandle<Result<MaterializeOutcome, CoreError>>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PublishPipeline {
    store: Arc<dyn RegistryStore>,
    verifier: Arc<dyn IntegrityVerifier>,
    activator: Arc<dyn Activator>,
}

impl PublishPipeline {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        verifier: Arc<dyn IntegrityVerifier>,
        activator: Arc<dyn Activator>,
    ) -> Self {
        Self {
            store,
            verifier,
            activator,
        }
    }

    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    pub fn verifier(&self) -> &Arc<dyn IntegrityVerifier> {
        &self.verifier
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Validate `manifest` and persist it as a new, inactive version.
    ///
    /// The owning extension is created when this is its first version.
    /// Mirroring passes `check_dependencies = false` since dependencies may
    /// legitimately arrive later in the replay.
    pub async fn create_version(
        &self,
        manifest: &PackageManifest,
        token: &AccessToken,
        timestamp: Timestamp,
        check_dependencies: bool,
    ) -> Result<ExtensionVersion, CoreError> {
        let (coordinates, input) = self
            .prepare_version(manifest, token, timestamp, check_dependencies)
            .await?;

        let version = self.store.create_version(&coordinates, &input).await?;
        tracing::info!(
            extension = %coordinates.to_log_format(),
            version_id = version.id,
            user_id = token.user_id,
            "Created extension version"
        );
        Ok(version)
    }

    /// Every validation read of a new version, ending in the row to write.
    async fn prepare_version(
        &self,
        manifest: &PackageManifest,
        token: &AccessToken,
        timestamp: Timestamp,
        check_dependencies: bool,
    ) -> Result<(VersionCoordinates, CreateExtensionVersion), CoreError> {
        let namespace = self
            .store
            .find_namespace(&manifest.publisher)
            .await?
            .ok_or_else(|| CoreError::UnknownPublisher(manifest.publisher.clone()))?;

        if !self
            .store
            .has_publish_permission(token.user_id, namespace.id)
            .await?
        {
            return Err(CoreError::InsufficientPermission(namespace.name));
        }

        validate_extension_name(&manifest.name)?;
        validate_extension_version(&manifest.version)?;
        let display_name = manifest.normalized_display_name();

        let coordinates = VersionCoordinates::new(
            &namespace.name,
            &manifest.name,
            &manifest.version,
            manifest.target_platform,
        );

        if let Some(extension) = self
            .store
            .find_extension(&namespace.name, &manifest.name)
            .await?
        {
            if let Some(existing) = self
                .store
                .find_version(extension.id, &manifest.version, manifest.target_platform)
                .await?
            {
                return Err(CoreError::DuplicateVersion {
                    id: coordinates.to_log_format(),
                    active: existing.active,
                });
            }
        }

        let issues = validate_metadata(manifest);
        if !issues.is_empty() {
            return Err(CoreError::MetadataInvalid(issues));
        }

        if check_dependencies {
            self.check_dependencies(manifest).await?;
        }

        let signature_key_pair_id = if self.verifier.is_enabled() {
            self.store.find_active_key_pair().await?.map(|pair| pair.id)
        } else {
            None
        };

        let input = CreateExtensionVersion {
            namespace_id: namespace.id,
            extension_name: manifest.name.clone(),
            version: manifest.version.clone(),
            target_platform: manifest.target_platform,
            pre_release: manifest.pre_release,
            display_name,
            description: manifest.description.clone(),
            license: manifest.license.clone(),
            homepage: manifest.homepage.clone(),
            repository: manifest.repository_url(),
            bugs: manifest.bugs_url(),
            categories: manifest.categories.clone(),
            tags: manifest.keywords.clone(),
            dependencies: manifest.extension_dependencies.clone(),
            bundled_extensions: manifest.extension_pack.clone(),
            engines: manifest.engine_list(),
            timestamp,
            published_with: Some(token.id),
            signature_key_pair_id,
        };
        Ok((coordinates, input))
    }

    /// Every declared dependency and bundled extension must be a well-formed
    /// `namespace.name`. Dependencies must also already exist; bundled
    /// extensions are only format-checked.
    async fn check_dependencies(&self, manifest: &PackageManifest) -> Result<(), CoreError> {
        let mut dependencies = Vec::with_capacity(manifest.extension_dependencies.len());
        for id in &manifest.extension_dependencies {
            dependencies.push((id, parse_extension_id(id, "extensionDependencies")?));
        }
        for id in &manifest.extension_pack {
            parse_extension_id(id, "extensionPack")?;
        }

        for (id, (namespace, name)) in dependencies {
            if self.store.find_extension(namespace, name).await?.is_none() {
                return Err(CoreError::UnresolvedDependency(id.clone()));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Materialization
    // -----------------------------------------------------------------------

    /// Store every resource of the archive and activate the version.
    ///
    /// The staged artifact is released whatever the outcome.
    pub async fn materialize(
        &self,
        download: &Download,
        artifact: TempFileHandle,
    ) -> Result<MaterializeOutcome, CoreError> {
        let outcome = self.rebuild_resources(download, &artifact).await;
        release_artifact(artifact);
        outcome
    }

    /// The body of [`Self::materialize`], borrowing the artifact so callers
    /// can run it more than once.
    pub async fn rebuild_resources(
        &self,
        download: &Download,
        artifact: &TempFileHandle,
    ) -> Result<MaterializeOutcome, CoreError> {
        let version = &download.version;
        let log_id = download.coordinates.to_log_format();

        let removed = self.store.delete_file_resources(version.id).await?;
        if removed > 0 {
            tracing::debug!(extension = %log_id, removed, "Cleared resources from a previous attempt");
        }

        self.store_resource(
            version.id,
            ResourceBlob::new(ResourceKind::Download, &download.file_name, artifact.read_all()?),
        )
        .await?;

        let mut extractor = ArtifactResourceExtractor::open(artifact.path())?;
        if extractor.is_potentially_malicious()? {
            self.store.set_potentially_malicious(version.id, true).await?;
            tracing::warn!(extension = %log_id, "Extension archive is potentially malicious, leaving version inactive");
            return Ok(MaterializeOutcome::Quarantined);
        }

        if self.verifier.is_enabled() {
            self.sign(download, artifact).await?;
        }

        for index in 0..extractor.entry_count() {
            if let Some(resource) = extractor.resource_at(index)? {
                self.store_resource(version.id, resource).await?;
            }
        }

        let manifest = extractor.manifest()?;
        for resource in extractor.file_resources(&manifest)? {
            self.store_resource(version.id, resource).await?;
        }
        self.store_resource(version.id, extractor.sha256_checksum(&download.file_name)?)
            .await?;

        self.activator.activate(version).await?;
        tracing::info!(extension = %log_id, "Materialized extension version");
        Ok(MaterializeOutcome::Activated)
    }

    async fn sign(&self, download: &Download, artifact: &TempFileHandle) -> Result<(), CoreError> {
        let version = &download.version;
        let Some(key_pair_id) = version.signature_key_pair_id else {
            tracing::warn!(
                extension = %download.coordinates.to_log_format(),
                "Signing is enabled but no key pair is attached, skipping signature"
            );
            return Ok(());
        };
        let Some(key_pair) = self.store.find_key_pair(key_pair_id).await? else {
            tracing::warn!(key_pair_id, "Attached signing key pair no longer exists, skipping signature");
            return Ok(());
        };

        let signature =
            self.verifier
                .sign(&download.file_name, artifact.path(), &key_pair.private_key)?;
        self.store_resource(version.id, signature).await
    }

    // -----------------------------------------------------------------------
    // Mirroring
    // -----------------------------------------------------------------------

    /// Create a version replayed from an upstream registry, already active,
    /// together with its resources.
    ///
    /// Only the download itself is stored. The signature and the
    /// archive-derived files are recorded by name with `archive` storage,
    /// since their content can be served from the upstream or rebuilt from
    /// the download on demand. Dependencies are not checked because they may
    /// legitimately arrive later in the replay.
    pub async fn mirror(
        &self,
        manifest: &PackageManifest,
        token: &AccessToken,
        timestamp: Timestamp,
        file_name: &str,
        artifact: &TempFileHandle,
        signature_name: Option<&str>,
    ) -> Result<ExtensionVersion, CoreError> {
        let (coordinates, input) = self
            .prepare_version(manifest, token, timestamp, false)
            .await?;

        let mut resources = vec![NewFileResource {
            kind: ResourceKind::Download.as_str().to_string(),
            name: file_name.to_string(),
            content: Some(artifact.read_all()?),
            storage: STORAGE_DATABASE.to_string(),
        }];
        if let Some(name) = signature_name {
            resources.push(locator(ResourceKind::Signature, name));
        }

        let mut extractor = ArtifactResourceExtractor::open(artifact.path())?;
        let archived = extractor.manifest()?;
        for resource in extractor.file_resources(&archived)? {
            resources.push(locator(resource.kind, &resource.name));
        }
        let checksum = extractor.sha256_checksum(file_name)?;
        resources.push(locator(checksum.kind, &checksum.name));

        let version = self
            .store
            .create_mirrored_version(&coordinates, &input, &resources)
            .await?;
        self.activator.activate(&version).await?;
        tracing::info!(
            extension = %coordinates.to_log_format(),
            version_id = version.id,
            resources = resources.len(),
            "Mirrored extension version"
        );
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    /// Publish an uploaded archive on behalf of the owner of `token_value`.
    ///
    /// Returns once the version is persisted; materialization continues on a
    /// background task with retries.
    pub async fn publish(
        &self,
        artifact: TempFileHandle,
        token_value: &str,
    ) -> Result<Publication, CoreError> {
        let token = self
            .store
            .find_access_token(token_value)
            .await?
            .ok_or(CoreError::InvalidAccessToken)?;

        let manifest = ArtifactResourceExtractor::open(artifact.path())?.manifest()?;
        let version = self
            .create_version(&manifest, &token, Utc::now(), true)
            .await?;

        let download = Download::new(version.clone(), manifest.coordinates());
        let pipeline = self.clone();
        let materialization = tokio::spawn(async move {
            materialize_with_retry(&pipeline, &download, artifact).await
        });

        Ok(Publication {
            version,
            materialization,
        })
    }

    // ---- private helpers ----

    async fn store_resource(&self, version_id: DbId, resource: ResourceBlob) -> Result<(), CoreError> {
        self.store
            .insert_file_resource(&CreateFileResource {
                extension_version_id: version_id,
                kind: resource.kind.as_str().to_string(),
                name: resource.name,
                content: Some(resource.content),
                storage: STORAGE_DATABASE.to_string(),
            })
            .await?;
        Ok(())
    }
}

/// A resource recorded by name only, its content living in the archive.
fn locator(kind: ResourceKind, name: &str) -> NewFileResource {
    NewFileResource {
        kind: kind.as_str().to_string(),
        name: name.to_string(),
        content: None,
        storage: STORAGE_ARCHIVE.to_string(),
    }
}

/// Delete a staged artifact, logging instead of failing.
pub(crate) fn release_artifact(artifact: TempFileHandle) {
    let path = artifact.path().to_path_buf();
    if let Err(e) = artifact.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to delete staged artifact");
    }
}
