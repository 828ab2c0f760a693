#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;

use serde_json::{json, Value};
use vsx_core::signing::{Ed25519Verifier, IntegrityVerifier};
use vsx_core::TempFileHandle;
use vsx_db::models::access_token::AccessToken;
use vsx_db::models::namespace::Namespace;
use vsx_pipeline::{MemoryStore, PublishPipeline, RegistryStore, StoreActivator};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const TOKEN: &str = "test-token";

/// A seeded in-memory registry: namespace `acme`, one member holding [`TOKEN`].
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub pipeline: PublishPipeline,
    pub namespace: Namespace,
    pub token: AccessToken,
}

pub fn fixture(signing_enabled: bool) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let namespace = store.add_namespace("acme");
    let user = store.add_user("github", "alice");
    store.add_membership(namespace.id, user.id);
    let token = store.add_token(user.id, TOKEN);

    let dyn_store: Arc<dyn RegistryStore> = store.clone();
    let verifier: Arc<dyn IntegrityVerifier> = Arc::new(Ed25519Verifier::new(signing_enabled));
    let activator = Arc::new(StoreActivator::new(dyn_store.clone()));
    let pipeline = PublishPipeline::new(dyn_store, verifier, activator);

    Fixture {
        store,
        pipeline,
        namespace,
        token,
    }
}

/// `package.json` for `acme.<name>@<version>`.
pub fn package_json(name: &str, version: &str) -> Value {
    json!({
        "publisher": "acme",
        "name": name,
        "version": version,
        "displayName": "Acme Tool",
        "description": "Does things",
        "license": "MIT",
        "engines": { "vscode": "^1.80.0" }
    })
}

pub fn vsix_manifest(platform: Option<&str>) -> String {
    let platform = platform
        .map(|p| format!(r#" TargetPlatform="{p}""#))
        .unwrap_or_default();
    format!(
        r#"<PackageManifest><Metadata><Identity Id="tool" Version="1.0.0" Publisher="acme"{platform}/></Metadata></PackageManifest>"#
    )
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A well-formed archive: package.json, vsixmanifest, readme and one script.
pub fn vsix(package: &Value, platform: Option<&str>) -> TempFileHandle {
    let package = serde_json::to_vec(package).unwrap();
    let manifest = vsix_manifest(platform);
    let bytes = zip_bytes(&[
        ("extension/package.json", &package),
        ("extension.vsixmanifest", manifest.as_bytes()),
        ("extension/README.md", b"# Acme Tool"),
        ("extension/out/main.js", b"exports.activate = () => {};"),
    ]);
    TempFileHandle::from_bytes("extension_", ".vsix", &bytes).unwrap()
}

/// An archive containing an entry that escapes the archive root.
pub fn malicious_vsix(package: &Value) -> TempFileHandle {
    let package = serde_json::to_vec(package).unwrap();
    let bytes = zip_bytes(&[
        ("extension/package.json", &package),
        ("../../etc/cron.d/evil", b"* * * * * root sh"),
    ]);
    TempFileHandle::from_bytes("extension_", ".vsix", &bytes).unwrap()
}

/// Resource kinds of a version, sorted for comparison.
pub fn resource_kinds(store: &MemoryStore, version_id: i64) -> Vec<String> {
    let mut kinds: Vec<String> = store
        .resources(version_id)
        .into_iter()
        .map(|r| r.kind)
        .collect();
    kinds.sort();
    kinds
}
