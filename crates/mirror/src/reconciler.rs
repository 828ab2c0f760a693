//! Replaying an upstream extension's version history locally.
//!
//! [`MirrorReconciler::reconcile`] computes, per target platform, which local
//! versions no longer exist upstream (deleted immediately) and which
//! upstream versions are missing locally. The missing ones are merged across
//! platforms, sorted by upstream publish time and replayed one at a time;
//! the first failure stops the batch and earlier additions stay applied.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use vsx_core::archive::ArtifactResourceExtractor;
use vsx_core::error::CoreError;
use vsx_core::naming::last_path_segment;
use vsx_core::resource::{KIND_DOWNLOAD, KIND_PUBLIC_KEY, KIND_SIGNATURE};
use vsx_core::types::Timestamp;
use vsx_core::TargetPlatform;
use vsx_db::models::extension_version::ExtensionVersion;
use vsx_db::models::membership::ROLE_OWNER;
use vsx_db::models::namespace::Namespace;
use vsx_db::models::user::User;
use vsx_pipeline::{PublishPipeline, RegistryStore};

use crate::artifact::{artifact_file_name, verify_artifact_signature, ArtifactSource};
use crate::catalog::CatalogEntry;
use crate::upstream::UpstreamCatalog;

/// Description of the access token minted for replayed publishes.
pub const MIRROR_TOKEN_DESCRIPTION: &str = "MirrorExtensionVersion";

/// Outcome tallies, accumulated by the caller across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorCounters {
    pub mirrored: u64,
    pub failed: u64,
    pub deleted: u64,
}

/// What one platform needs to converge with the upstream.
#[derive(Debug, Default)]
pub struct PlatformDelta {
    /// Local versions no longer listed upstream.
    pub to_delete: Vec<ExtensionVersion>,
    /// Upstream versions not present locally.
    pub to_add: Vec<String>,
}

/// Compare local versions of one platform with the upstream version set.
pub fn platform_delta(local: &[ExtensionVersion], upstream: &BTreeSet<String>) -> PlatformDelta {
    let to_delete = local
        .iter()
        .filter(|v| !upstream.contains(&v.version))
        .cloned()
        .collect();
    let to_add = upstream
        .iter()
        .filter(|version| !local.iter().any(|v| &v.version == *version))
        .cloned()
        .collect();
    PlatformDelta { to_delete, to_add }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct MirrorReconciler {
    pipeline: PublishPipeline,
    upstream: Arc<dyn UpstreamCatalog>,
    artifacts: Arc<dyn ArtifactSource>,
}

impl MirrorReconciler {
    pub fn new(
        pipeline: PublishPipeline,
        upstream: Arc<dyn UpstreamCatalog>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            pipeline,
            upstream,
            artifacts,
        }
    }

    fn store(&self) -> &Arc<dyn RegistryStore> {
        self.pipeline.store()
    }

    /// Bring `namespace.name` in line with the upstream.
    ///
    /// Version reconciliation is skipped when `previous_sync` is set and
    /// the local extension was updated on or after both that date and the
    /// upstream timestamp. Activation and metadata refresh always run.
    pub async fn mirror_extension(
        &self,
        namespace: &str,
        name: &str,
        acting_user: &User,
        previous_sync: Option<NaiveDate>,
        counters: &mut MirrorCounters,
    ) -> Result<(), CoreError> {
        let Some(latest) = self.upstream.latest(namespace, name).await? else {
            tracing::warn!(namespace, name, "Extension not found upstream, nothing to mirror");
            return Ok(());
        };

        if self
            .needs_reconcile(namespace, name, previous_sync, &latest)
            .await?
        {
            self.reconcile(namespace, name, acting_user, counters).await?;
        } else {
            tracing::info!(namespace, name, "All versions are up to date");
        }

        if let Some(extension) = self.store().find_extension(namespace, name).await? {
            let refreshed = self.store().refresh_extension_active(extension.id).await?;
            tracing::debug!(
                namespace,
                name,
                active = refreshed.is_some_and(|e| e.active),
                "Activated extension"
            );
            self.store()
                .update_extension_metadata(extension.id, &latest.extension_metadata())
                .await?;
            tracing::debug!(namespace, name, "Updated extension metadata");
        }

        self.mirror_namespace_metadata(namespace).await
    }

    async fn needs_reconcile(
        &self,
        namespace: &str,
        name: &str,
        previous_sync: Option<NaiveDate>,
        latest: &CatalogEntry,
    ) -> Result<bool, CoreError> {
        let Some(previous_sync) = previous_sync else {
            return Ok(true);
        };
        let Some(extension) = self.store().find_extension(namespace, name).await? else {
            return Ok(true);
        };

        let last_updated = extension.last_updated_date;
        Ok(last_updated.date_naive() < previous_sync || last_updated < latest.published_at()?)
    }

    async fn mirror_namespace_metadata(&self, namespace: &str) -> Result<(), CoreError> {
        let Some(details) = self.upstream.namespace_details(namespace).await? else {
            return Ok(());
        };
        if let Some(local) = self.store().find_namespace(namespace).await? {
            self.store()
                .update_namespace_metadata(local.id, &details.to_update())
                .await?;
            tracing::debug!(namespace, "Updated namespace metadata");
        }
        Ok(())
    }

    /// Full version reconciliation across every target platform.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
        acting_user: &User,
        counters: &mut MirrorCounters,
    ) -> Result<(), CoreError> {
        let local_namespace = self.store().ensure_namespace(namespace).await?;
        let extension = self.store().find_extension(namespace, name).await?;

        let mut to_add: Vec<(Timestamp, CatalogEntry)> = Vec::new();
        for platform in TargetPlatform::ALL {
            let Some(entry) = self.upstream.for_platform(namespace, name, platform).await? else {
                continue;
            };
            let upstream_versions = entry.upstream_versions();

            let local = match &extension {
                Some(extension) => {
                    self.store()
                        .list_versions_for_platform(extension.id, platform)
                        .await?
                }
                None => Vec::new(),
            };

            let delta = platform_delta(&local, &upstream_versions);
            for version in delta.to_delete {
                self.store().delete_version(version.id, acting_user.id).await?;
                counters.deleted += 1;
                tracing::info!(
                    namespace,
                    name,
                    version = %version.version,
                    platform = platform.as_str(),
                    acting_user = %acting_user.login_name,
                    "Deleted version no longer present upstream"
                );
            }

            for version in delta.to_add {
                let entry = self
                    .upstream
                    .version(namespace, name, platform, &version)
                    .await?;
                to_add.push((entry.published_at()?, entry));
            }
        }

        to_add.sort_by_key(|(timestamp, _)| *timestamp);

        let total = to_add.len();
        for (index, (timestamp, entry)) in to_add.iter().enumerate() {
            tracing::info!(
                extension = %entry.to_log_format(),
                position = index + 1,
                total,
                "Mirroring extension version"
            );
            match self.mirror_version(&local_namespace, entry, *timestamp).await {
                Ok(()) => counters.mirrored += 1,
                Err(e) => {
                    counters.failed += 1;
                    tracing::error!(
                        extension = %entry.to_log_format(),
                        error = %e,
                        "Mirroring failed, aborting remaining versions"
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Download, verify and publish one upstream version.
    async fn mirror_version(
        &self,
        namespace: &Namespace,
        entry: &CatalogEntry,
        timestamp: Timestamp,
    ) -> Result<(), CoreError> {
        let log_id = entry.to_log_format();
        let download_url = entry.file(KIND_DOWNLOAD).ok_or_else(|| {
            CoreError::Upstream(format!("No download link for {log_id}"))
        })?;
        let publisher = entry.published_by.as_ref().ok_or_else(|| {
            CoreError::Upstream(format!("No publisher information for {log_id}"))
        })?;

        let location = self.artifacts.resolve_location(download_url).await?;
        let file_name = artifact_file_name(&location)?.to_string();

        let artifact = self
            .artifacts
            .download(download_url, "extension_", ".vsix")
            .await?;

        let signature_name = match entry.file(KIND_SIGNATURE) {
            Some(signature_url) => {
                let public_key_url = entry.file(KIND_PUBLIC_KEY).ok_or_else(|| {
                    CoreError::Upstream(format!("No public key link for {log_id}"))
                })?;
                let signature_zip = self
                    .artifacts
                    .download(signature_url, "extension_", ".sigzip")
                    .await?;
                let public_key = self
                    .artifacts
                    .download(public_key_url, "public_", ".pem")
                    .await?;
                verify_artifact_signature(
                    self.pipeline.verifier().as_ref(),
                    &log_id,
                    &artifact,
                    &signature_zip,
                    &public_key,
                )?;
                Some(last_path_segment(signature_url).to_string())
            }
            None => None,
        };

        let user = self
            .store()
            .get_or_add_user(&publisher.to_create_user())
            .await?;
        self.store()
            .ensure_membership(namespace.id, user.id, ROLE_OWNER)
            .await?;
        let token = self
            .store()
            .get_or_add_access_token(user.id, MIRROR_TOKEN_DESCRIPTION)
            .await?;

        let manifest = ArtifactResourceExtractor::open(artifact.path())?.manifest()?;
        self.pipeline
            .mirror(
                &manifest,
                &token,
                timestamp,
                &file_name,
                &artifact,
                signature_name.as_deref(),
            )
            .await?;

        tracing::debug!(extension = %log_id, "Completed mirroring of extension version");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn local(id: i64, version: &str) -> ExtensionVersion {
        ExtensionVersion {
            id,
            extension_id: 1,
            version: version.to_string(),
            target_platform: TargetPlatform::Universal,
            pre_release: false,
            display_name: None,
            description: None,
            license: None,
            homepage: None,
            repository: None,
            bugs: None,
            categories: Vec::new(),
            tags: Vec::new(),
            dependencies: Vec::new(),
            bundled_extensions: Vec::new(),
            engines: Vec::new(),
            timestamp: Utc::now(),
            published_with: None,
            active: true,
            potentially_malicious: false,
            signature_key_pair_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn delta_deletes_local_only_and_adds_upstream_only() {
        let local = vec![local(1, "1.0"), local(2, "1.3")];
        let upstream: BTreeSet<String> =
            ["1.0", "1.1", "1.2"].into_iter().map(String::from).collect();

        let delta = platform_delta(&local, &upstream);
        assert_eq!(
            delta.to_delete.iter().map(|v| v.id).collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(delta.to_add, vec!["1.1".to_string(), "1.2".to_string()]);
    }

    #[test]
    fn delta_is_empty_when_in_sync() {
        let local = vec![local(1, "1.0")];
        let upstream: BTreeSet<String> = ["1.0".to_string()].into_iter().collect();
        let delta = platform_delta(&local, &upstream);
        assert!(delta.to_delete.is_empty());
        assert!(delta.to_add.is_empty());
    }
}
