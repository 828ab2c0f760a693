#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vsx_core::error::CoreError;
use vsx_core::signing::{Ed25519Verifier, GeneratedKeyPair, IntegrityVerifier};
use vsx_core::TargetPlatform;
use vsx_core::TempFileHandle;
use vsx_db::models::user::User;
use vsx_mirror::{
    ArtifactSource, CatalogEntry, MirrorReconciler, NamespaceDetails, PublisherInfo,
    UpstreamCatalog,
};
use vsx_pipeline::{MemoryStore, PublishPipeline, RegistryStore, StoreActivator};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const UPSTREAM: &str = "https://upstream.test";
pub const PUBLIC_KEY_URL: &str = "https://upstream.test/keys/public.pem";

// ---------------------------------------------------------------------------
// Fake upstream catalog
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UpstreamState {
    latest: Option<CatalogEntry>,
    platforms: HashMap<TargetPlatform, Vec<CatalogEntry>>,
    namespace: Option<NamespaceDetails>,
    calls: Vec<String>,
}

/// In-memory upstream registry for `acme.tool` recording every lookup.
#[derive(Default)]
pub struct FakeUpstream {
    state: Mutex<UpstreamState>,
}

impl FakeUpstream {
    pub fn add_version(&self, entry: CatalogEntry) {
        let platform = TargetPlatform::from_optional(entry.target_platform.as_deref()).unwrap();
        let mut state = self.state.lock().unwrap();
        state.platforms.entry(platform).or_default().push(entry.clone());
        let newer = state
            .latest
            .as_ref()
            .map_or(true, |latest| latest.timestamp < entry.timestamp);
        if newer {
            state.latest = Some(entry);
        }
    }

    pub fn set_latest_download_count(&self, count: i64) {
        if let Some(latest) = self.state.lock().unwrap().latest.as_mut() {
            latest.download_count = Some(count);
        }
    }

    pub fn set_namespace(&self, details: NamespaceDetails) {
        self.state.lock().unwrap().namespace = Some(details);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl UpstreamCatalog for FakeUpstream {
    async fn latest(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CatalogEntry>, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("latest {namespace}.{name}"));
        Ok(state.latest.clone())
    }

    async fn for_platform(
        &self,
        _namespace: &str,
        _name: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<CatalogEntry>, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("platform {}", target_platform.as_str()));
        let Some(entries) = state.platforms.get(&target_platform) else {
            return Ok(None);
        };
        let mut all_versions: BTreeMap<String, String> = entries
            .iter()
            .map(|e| (e.version.clone(), format!("{UPSTREAM}/{}", e.version)))
            .collect();
        all_versions.insert("latest".into(), format!("{UPSTREAM}/latest"));

        let mut entry = entries.last().cloned().unwrap_or_default();
        entry.all_versions = all_versions;
        Ok(Some(entry))
    }

    async fn version(
        &self,
        _namespace: &str,
        _name: &str,
        target_platform: TargetPlatform,
        version: &str,
    ) -> Result<CatalogEntry, CoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("version {} {version}", target_platform.as_str()));
        state
            .platforms
            .get(&target_platform)
            .and_then(|entries| entries.iter().find(|e| e.version == version))
            .cloned()
            .ok_or_else(|| CoreError::Upstream(format!("no such version {version}")))
    }

    async fn namespace_details(
        &self,
        namespace: &str,
    ) -> Result<Option<NamespaceDetails>, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("namespace {namespace}"));
        Ok(state.namespace.clone())
    }
}

// ---------------------------------------------------------------------------
// Fake artifact source
// ---------------------------------------------------------------------------

/// Serves registered URLs; each URL resolves to itself.
#[derive(Default)]
pub struct FakeArtifacts {
    files: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeArtifacts {
    pub fn put(&self, url: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSource for FakeArtifacts {
    async fn resolve_location(&self, url: &str) -> Result<String, CoreError> {
        if self.files.lock().unwrap().contains_key(url) {
            Ok(url.to_string())
        } else {
            Err(CoreError::ResolutionError(format!("No location header returned for {url}")))
        }
    }

    async fn download(
        &self,
        url: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<TempFileHandle, CoreError> {
        self.downloads.lock().unwrap().push(url.to_string());
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| CoreError::Upstream(format!("{url} returned HTTP 404")))?;
        Ok(TempFileHandle::from_bytes(prefix, suffix, &bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub pipeline: PublishPipeline,
    pub upstream: Arc<FakeUpstream>,
    pub artifacts: Arc<FakeArtifacts>,
    pub reconciler: MirrorReconciler,
    pub mirror_user: User,
}

pub fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.add_namespace("acme");
    let mirror_user = store.add_user("system", "mirror");

    let dyn_store: Arc<dyn RegistryStore> = store.clone();
    let pipeline = PublishPipeline::new(
        dyn_store.clone(),
        Arc::new(Ed25519Verifier::new(false)),
        Arc::new(StoreActivator::new(dyn_store)),
    );
    let upstream = Arc::new(FakeUpstream::default());
    let artifacts = Arc::new(FakeArtifacts::default());
    let reconciler = MirrorReconciler::new(pipeline.clone(), upstream.clone(), artifacts.clone());

    Fixture {
        store,
        pipeline,
        upstream,
        artifacts,
        reconciler,
        mirror_user,
    }
}

// ---------------------------------------------------------------------------
// Upstream content
// ---------------------------------------------------------------------------

pub fn vsix_bytes(version: &str, platform: TargetPlatform) -> Vec<u8> {
    let package = serde_json::json!({
        "publisher": "acme",
        "name": "tool",
        "version": version,
        "displayName": "Acme Tool",
    })
    .to_string();
    let platform_attr = if platform.is_universal() {
        String::new()
    } else {
        format!(r#" TargetPlatform="{}""#, platform.as_str())
    };
    let manifest = format!(
        r#"<PackageManifest><Metadata><Identity Id="tool" Version="{version}" Publisher="acme"{platform_attr}/></Metadata></PackageManifest>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("extension/package.json", package.as_bytes()),
        ("extension.vsixmanifest", manifest.as_bytes()),
        ("extension/README.md", b"# Acme Tool".as_slice()),
    ] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn download_name(version: &str, platform: TargetPlatform) -> String {
    if platform.is_universal() {
        format!("acme.tool-{version}.vsix")
    } else {
        format!("acme.tool-{version}@{}.vsix", platform.as_str())
    }
}

/// Signature bundle of `bytes` made with `key_pair`.
pub fn sign(key_pair: &GeneratedKeyPair, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let artifact = TempFileHandle::from_bytes("extension_", ".vsix", bytes).unwrap();
    Ed25519Verifier::new(true)
        .sign(file_name, artifact.path(), &key_pair.private_key)
        .unwrap()
        .content
}

pub fn key_pair() -> GeneratedKeyPair {
    Ed25519Verifier::new(true).generate_key_pair().unwrap()
}

/// Publish `acme.tool@version` upstream, optionally signed. Returns the
/// download URL.
pub fn publish_upstream(
    fx: &Fixture,
    version: &str,
    platform: TargetPlatform,
    timestamp: &str,
    key_pair: Option<&GeneratedKeyPair>,
) -> String {
    let file_name = download_name(version, platform);
    let bytes = vsix_bytes(version, platform);
    let download_url = format!("{UPSTREAM}/files/{file_name}");

    let mut files = HashMap::from([("download".to_string(), download_url.clone())]);
    if let Some(key_pair) = key_pair {
        let signature_url = format!("{UPSTREAM}/files/{}", file_name.replace(".vsix", ".sigzip"));
        fx.artifacts.put(&signature_url, sign(key_pair, &file_name, &bytes));
        fx.artifacts
            .put(PUBLIC_KEY_URL, key_pair.public_key_text.clone().into_bytes());
        files.insert("signature".into(), signature_url);
        files.insert("publicKey".into(), PUBLIC_KEY_URL.into());
    }
    fx.artifacts.put(&download_url, bytes);

    fx.upstream.add_version(CatalogEntry {
        namespace: "acme".into(),
        name: "tool".into(),
        version: version.into(),
        target_platform: Some(platform.as_str().into()),
        timestamp: timestamp.into(),
        files,
        published_by: Some(PublisherInfo {
            provider: "github".into(),
            login_name: "bob".into(),
            full_name: Some("Bob Builder".into()),
            avatar_url: None,
            homepage: None,
        }),
        download_count: Some(7),
        average_rating: Some(4.5),
        review_count: Some(2),
        ..Default::default()
    });
    download_url
}
