//! Integration tests for the publish pipeline against the in-memory store.
//!
//! Verifies that:
//! - Version creation validates before writing and leaves nothing behind on failure
//! - Duplicate publishes are rejected with the existing version's activity
//! - Materialization stores the full resource set, activates, and is re-runnable
//! - Potentially malicious archives are quarantined with only the download stored
//! - Mirrored versions are created active with archive-backed resources, or not at all

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use common::{fixture, malicious_vsix, package_json, resource_kinds, vsix, TOKEN};
use serde_json::json;
use vsx_core::error::CoreError;
use vsx_core::manifest::PackageManifest;
use vsx_core::signing::{Ed25519Verifier, IntegrityVerifier};
use vsx_core::TargetPlatform;
use vsx_db::models::file_resource::{STORAGE_ARCHIVE, STORAGE_DATABASE};
use vsx_pipeline::retry::materialize_with_delays;
use vsx_pipeline::{Download, MaterializeOutcome, RegistryStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn manifest(value: serde_json::Value) -> PackageManifest {
    PackageManifest::from_json(&serde_json::to_vec(&value).unwrap()).unwrap()
}

const MATERIALIZED_KINDS: [&str; 8] = [
    "download",
    "manifest",
    "readme",
    "resource",
    "resource",
    "resource",
    "sha256",
    "vsixmanifest",
];

// ---------------------------------------------------------------------------
// create_version
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_version_persists_inactive_version_without_resources() {
    let fx = fixture(false);
    let version = fx
        .pipeline
        .create_version(&manifest(package_json("tool", "1.0.0")), &fx.token, Utc::now(), true)
        .await
        .unwrap();

    assert!(!version.active);
    assert_eq!(version.target_platform, TargetPlatform::Universal);
    assert_eq!(version.display_name.as_deref(), Some("Acme Tool"));
    assert_eq!(version.engines, vec!["vscode@^1.80.0".to_string()]);
    assert_eq!(version.published_with, Some(fx.token.id));
    assert!(fx.store.resources(version.id).is_empty());

    let extension = fx.store.extension("acme", "tool").unwrap();
    assert!(!extension.active);
    assert_eq!(extension.published_date, version.timestamp);
}

#[tokio::test]
async fn second_version_only_moves_last_updated_date() {
    let fx = fixture(false);
    let first = Utc::now() - chrono::Duration::days(3);
    let second = Utc::now();

    fx.pipeline
        .create_version(&manifest(package_json("tool", "1.0.0")), &fx.token, first, true)
        .await
        .unwrap();
    fx.pipeline
        .create_version(&manifest(package_json("tool", "1.1.0")), &fx.token, second, true)
        .await
        .unwrap();

    let extension = fx.store.extension("acme", "tool").unwrap();
    assert_eq!(extension.published_date, first);
    assert_eq!(extension.last_updated_date, second);
}

#[tokio::test]
async fn unknown_publisher_is_rejected() {
    let fx = fixture(false);
    let mut package = package_json("tool", "1.0.0");
    package["publisher"] = json!("nobody");

    let err = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::UnknownPublisher(ref p) if p == "nobody");
    assert!(err.to_string().contains("create-namespace"));
}

#[tokio::test]
async fn non_member_lacks_publish_permission() {
    let fx = fixture(false);
    fx.store.add_namespace("other");
    let mut package = package_json("tool", "1.0.0");
    package["publisher"] = json!("other");

    let err = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InsufficientPermission(ref ns) if ns == "other");
}

#[tokio::test]
async fn version_alias_and_bad_names_are_rejected() {
    let fx = fixture(false);

    let err = fx
        .pipeline
        .create_version(&manifest(package_json("tool", "latest")), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidIdentifier(_));

    let err = fx
        .pipeline
        .create_version(&manifest(package_json("bad name", "1.0.0")), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidIdentifier(_));
    assert!(fx.store.versions().is_empty());
}

#[tokio::test]
async fn duplicate_publish_reports_activity_of_existing_version() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");

    let version = fx
        .pipeline
        .create_version(&manifest(package.clone()), &fx.token, Utc::now(), true)
        .await
        .unwrap();

    let err = fx
        .pipeline
        .create_version(&manifest(package.clone()), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::DuplicateVersion { active: false, .. });
    assert!(err.to_string().ends_with("isn't active and therefore not visible."));

    let download = Download::new(version, manifest(package.clone()).coordinates());
    fx.pipeline
        .materialize(&download, vsix(&package, None))
        .await
        .unwrap();

    let err = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Extension acme.tool-1.0.0 is already published.");
}

#[tokio::test]
async fn same_version_for_another_platform_is_distinct() {
    let fx = fixture(false);
    let mut linux = manifest(package_json("tool", "1.0.0"));
    linux.target_platform = TargetPlatform::LinuxX64;
    let mut windows = linux.clone();
    windows.target_platform = TargetPlatform::Win32X64;

    fx.pipeline.create_version(&linux, &fx.token, Utc::now(), true).await.unwrap();
    fx.pipeline.create_version(&windows, &fx.token, Utc::now(), true).await.unwrap();
    assert_eq!(fx.store.versions().len(), 2);
}

#[tokio::test]
async fn invalid_metadata_leaves_no_extension_behind() {
    let fx = fixture(false);
    let mut package = package_json("tool", "1.0.0");
    package["homepage"] = json!("not a url");
    package["galleryBanner"] = json!({ "color": "blue" });

    let err = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::MetadataInvalid(ref issues) if issues.len() == 2);
    assert!(err
        .to_string()
        .starts_with("Multiple issues were found in the extension metadata:"));
    assert!(fx.store.extension("acme", "tool").is_none());
}

#[tokio::test]
async fn dependencies_must_resolve_when_checked() {
    let fx = fixture(false);
    let mut package = package_json("tool", "1.0.0");
    package["extensionDependencies"] = json!(["acme.base"]);

    let err = fx
        .pipeline
        .create_version(&manifest(package.clone()), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::UnresolvedDependency(ref id) if id == "acme.base");
    assert!(fx.store.extension("acme", "tool").is_none());

    fx.pipeline
        .create_version(&manifest(package_json("base", "1.0.0")), &fx.token, Utc::now(), true)
        .await
        .unwrap();
    let version = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), true)
        .await
        .unwrap();
    assert_eq!(version.dependencies, vec!["acme.base".to_string()]);
}

#[tokio::test]
async fn malformed_bundled_extension_is_rejected() {
    let fx = fixture(false);
    let mut package = package_json("tool", "1.0.0");
    package["extensionPack"] = json!(["acme."]);

    let err = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), true)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid 'extensionPack' format. Expected: '${namespace}.${name}'"
    );
}

#[tokio::test]
async fn unchecked_dependencies_are_stored_verbatim() {
    let fx = fixture(false);
    let mut package = package_json("tool", "1.0.0");
    package["extensionDependencies"] = json!(["acme.later"]);

    let version = fx
        .pipeline
        .create_version(&manifest(package), &fx.token, Utc::now(), false)
        .await
        .unwrap();
    assert_eq!(version.dependencies, vec!["acme.later".to_string()]);
}

// ---------------------------------------------------------------------------
// materialize
// ---------------------------------------------------------------------------

#[tokio::test]
async fn materialize_stores_resources_and_activates() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();
    let artifact = vsix(&package, None);
    let artifact_path = artifact.path().to_path_buf();

    let outcome = fx
        .pipeline
        .materialize(&Download::new(version.clone(), m.coordinates()), artifact)
        .await
        .unwrap();

    assert_eq!(outcome, MaterializeOutcome::Activated);
    assert_eq!(resource_kinds(&fx.store, version.id), MATERIALIZED_KINDS);
    assert!(!artifact_path.exists(), "staged artifact must be released");

    let stored = fx.store.versions().into_iter().find(|v| v.id == version.id).unwrap();
    assert!(stored.active);
    assert!(fx.store.extension("acme", "tool").unwrap().active);

    let resources = fx.store.resources(version.id);
    let download = resources.iter().find(|r| r.kind == "download").unwrap();
    assert_eq!(download.name, "acme.tool-1.0.0.vsix");
    assert_eq!(download.storage, STORAGE_DATABASE);
    let checksum = resources.iter().find(|r| r.kind == "sha256").unwrap();
    assert_eq!(checksum.name, "acme.tool-1.0.0.sha256");
}

#[tokio::test]
async fn rerunning_materialize_rebuilds_the_same_resource_set() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();
    let download = Download::new(version.clone(), m.coordinates());

    fx.pipeline.materialize(&download, vsix(&package, None)).await.unwrap();
    let first = resource_kinds(&fx.store, version.id);
    fx.pipeline.materialize(&download, vsix(&package, None)).await.unwrap();

    assert_eq!(resource_kinds(&fx.store, version.id), first);
}

#[tokio::test]
async fn retry_recovers_from_partial_failure() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();
    let download = Download::new(version.clone(), m.coordinates());

    fx.pipeline.materialize(&download, vsix(&package, None)).await.unwrap();
    let expected = resource_kinds(&fx.store, version.id);

    // The first two attempts fail; the third must rebuild without duplicates.
    fx.store.fail_next_resource_inserts(2);
    let artifact = vsix(&package, None);
    let artifact_path = artifact.path().to_path_buf();
    let outcome = materialize_with_delays(&fx.pipeline, &download, artifact, &[Duration::ZERO; 3])
        .await
        .unwrap();

    assert_eq!(outcome, MaterializeOutcome::Activated);
    assert_eq!(resource_kinds(&fx.store, version.id), expected);
    assert!(!artifact_path.exists());
}

#[tokio::test]
async fn exhausted_retries_still_release_the_artifact() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();
    let download = Download::new(version, m.coordinates());

    fx.store.fail_next_resource_inserts(100);
    let artifact = vsix(&package, None);
    let artifact_path = artifact.path().to_path_buf();
    let err = materialize_with_delays(&fx.pipeline, &download, artifact, &[Duration::ZERO; 2])
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Persistence(_));
    assert!(!artifact_path.exists());
}

#[tokio::test]
async fn malicious_archive_is_quarantined() {
    let fx = fixture(true);
    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();

    let outcome = fx
        .pipeline
        .materialize(&Download::new(version.clone(), m.coordinates()), malicious_vsix(&package))
        .await
        .unwrap();

    assert_eq!(outcome, MaterializeOutcome::Quarantined);
    assert_eq!(resource_kinds(&fx.store, version.id), vec!["download".to_string()]);
    let stored = fx.store.versions().into_iter().find(|v| v.id == version.id).unwrap();
    assert!(!stored.active);
    assert!(stored.potentially_malicious);
    assert!(!fx.store.extension("acme", "tool").unwrap().active);
}

#[tokio::test]
async fn signing_adds_signature_when_key_pair_attached() {
    let fx = fixture(true);
    let key_pair = Ed25519Verifier::new(true).generate_key_pair().unwrap();
    let stored_pair = fx.store.insert_active_key_pair(&key_pair).await.unwrap();

    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();
    assert_eq!(version.signature_key_pair_id, Some(stored_pair.id));

    fx.pipeline
        .materialize(&Download::new(version.clone(), m.coordinates()), vsix(&package, None))
        .await
        .unwrap();

    let resources = fx.store.resources(version.id);
    let signature = resources.iter().find(|r| r.kind == "signature").unwrap();
    assert_eq!(signature.name, "acme.tool-1.0.0.sigzip");
    assert!(signature.content.as_ref().is_some_and(|c| !c.is_empty()));
}

#[tokio::test]
async fn signing_without_key_pair_skips_signature() {
    let fx = fixture(true);
    let package = package_json("tool", "1.0.0");
    let m = manifest(package.clone());
    let version = fx
        .pipeline
        .create_version(&m, &fx.token, Utc::now(), true)
        .await
        .unwrap();
    assert_eq!(version.signature_key_pair_id, None);

    let outcome = fx
        .pipeline
        .materialize(&Download::new(version.clone(), m.coordinates()), vsix(&package, None))
        .await
        .unwrap();
    assert_eq!(outcome, MaterializeOutcome::Activated);
    assert_eq!(resource_kinds(&fx.store, version.id), MATERIALIZED_KINDS);
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_rejects_unknown_token() {
    let fx = fixture(false);
    let err = fx
        .pipeline
        .publish(vsix(&package_json("tool", "1.0.0"), None), "wrong")
        .await
        .err()
        .unwrap();
    assert_matches!(err, CoreError::InvalidAccessToken);
    assert!(fx.store.versions().is_empty());
}

#[tokio::test]
async fn publish_creates_then_materializes_in_background() {
    let fx = fixture(false);
    let publication = fx
        .pipeline
        .publish(vsix(&package_json("tool", "2.0.0"), Some("linux-x64")), TOKEN)
        .await
        .unwrap();

    assert_eq!(publication.version.target_platform, TargetPlatform::LinuxX64);
    let outcome = publication.materialization.await.unwrap().unwrap();
    assert_eq!(outcome, MaterializeOutcome::Activated);

    let resources = fx.store.resources(publication.version.id);
    let download = resources.iter().find(|r| r.kind == "download").unwrap();
    assert_eq!(download.name, "acme.tool-2.0.0@linux-x64.vsix");
}

// ---------------------------------------------------------------------------
// mirror
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mirror_records_archive_backed_resources() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");
    let artifact = vsix(&package, None);

    let version = fx
        .pipeline
        .mirror(
            &manifest(package),
            &fx.token,
            Utc::now(),
            "acme.tool-1.0.0.vsix",
            &artifact,
            Some("acme.tool-1.0.0.sigzip"),
        )
        .await
        .unwrap();
    assert!(version.active);

    let resources = fx.store.resources(version.id);
    let download = resources.iter().find(|r| r.kind == "download").unwrap();
    assert_eq!(download.storage, STORAGE_DATABASE);
    assert!(download.content.is_some());

    let locators: Vec<(&str, &str)> = resources
        .iter()
        .filter(|r| r.kind != "download")
        .map(|r| (r.kind.as_str(), r.name.as_str()))
        .collect();
    assert_eq!(
        locators,
        vec![
            ("signature", "acme.tool-1.0.0.sigzip"),
            ("manifest", "package.json"),
            ("vsixmanifest", "extension.vsixmanifest"),
            ("readme", "README.md"),
            ("sha256", "acme.tool-1.0.0.sha256"),
        ]
    );
    assert!(resources
        .iter()
        .filter(|r| r.kind != "download")
        .all(|r| r.storage == STORAGE_ARCHIVE && r.content.is_none()));

    let stored = fx.store.versions().into_iter().find(|v| v.id == version.id).unwrap();
    assert!(stored.active);
    assert!(fx.store.extension("acme", "tool").unwrap().active);
}

#[tokio::test]
async fn failed_mirror_leaves_no_version_behind() {
    let fx = fixture(false);
    let package = package_json("tool", "1.0.0");
    let artifact = vsix(&package, None);
    fx.store.fail_next_resource_inserts(2);

    let err = fx
        .pipeline
        .mirror(
            &manifest(package.clone()),
            &fx.token,
            Utc::now(),
            "acme.tool-1.0.0.vsix",
            &artifact,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Persistence(_));
    assert!(fx.store.versions().is_empty());
    assert!(fx.store.extension("acme", "tool").is_none());

    // One injected failure is still pending.
    fx.pipeline
        .mirror(&manifest(package.clone()), &fx.token, Utc::now(), "acme.tool-1.0.0.vsix", &artifact, None)
        .await
        .unwrap_err();

    let version = fx
        .pipeline
        .mirror(&manifest(package), &fx.token, Utc::now(), "acme.tool-1.0.0.vsix", &artifact, None)
        .await
        .unwrap();
    assert_eq!(fx.store.versions().len(), 1);
    assert!(fx
        .store
        .resources(version.id)
        .iter()
        .any(|r| r.kind == "download" && r.name == "acme.tool-1.0.0.vsix"));
}
