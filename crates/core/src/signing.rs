//! Detached Ed25519 signatures for extension archives.
//!
//! - The signed message is the SHA-256 digest of the whole archive.
//! - A signature ships as a zip ("sigzip") holding one entry whose name ends
//!   in [`SIGNATURE_ENTRY_SUFFIX`]; the entry contains the base64 signature.
//! - Public keys are base64 text, optionally PEM-armored, either the raw
//!   32-byte key or its SubjectPublicKeyInfo DER encoding.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::CoreError;
use crate::hashing::{sha256_file, sha256_hex};
use crate::naming::download_stem;
use crate::resource::{ResourceBlob, ResourceKind};
use crate::temp_file::TempFileHandle;

/// Suffix identifying the signature entry inside a signature archive.
pub const SIGNATURE_ENTRY_SUFFIX: &str = ".signature.sig";

/// Name of the signature entry written by [`Ed25519Verifier::sign`].
pub const SIGNATURE_ENTRY_NAME: &str = "extension.signature.sig";

/// DER prefix of an Ed25519 SubjectPublicKeyInfo structure.
const SPKI_ED25519_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Freshly generated signing material, ready to be persisted.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    pub public_id: String,
    pub private_key: Vec<u8>,
    pub public_key_text: String,
}

/// Signs published archives and verifies mirrored ones.
pub trait IntegrityVerifier: Send + Sync {
    /// Whether signing is enabled system-wide.
    fn is_enabled(&self) -> bool;

    /// Produce the detached signature resource for the archive at `artifact`.
    fn sign(
        &self,
        download_name: &str,
        artifact: &Path,
        private_key: &[u8],
    ) -> Result<ResourceBlob, CoreError>;

    /// Check `signature` (the extracted signature entry) against `artifact`
    /// using the public key stored in `public_key`.
    fn verify(&self, artifact: &Path, signature: &Path, public_key: &Path)
        -> Result<bool, CoreError>;

    fn generate_key_pair(&self) -> Result<GeneratedKeyPair, CoreError>;
}

// ---------------------------------------------------------------------------
// Ed25519 implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Ed25519Verifier {
    enabled: bool,
}

impl Ed25519Verifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl IntegrityVerifier for Ed25519Verifier {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn sign(
        &self,
        download_name: &str,
        artifact: &Path,
        private_key: &[u8],
    ) -> Result<ResourceBlob, CoreError> {
        let seed: [u8; 32] = private_key.try_into().map_err(|_| {
            CoreError::InvalidArtifact(format!(
                "Signing key must be 32 bytes, got {}",
                private_key.len()
            ))
        })?;
        let signing_key = SigningKey::from_bytes(&seed);
        let digest = sha256_file(artifact)?;
        let signature = signing_key.sign(&digest);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(SIGNATURE_ENTRY_NAME, SimpleFileOptions::default())
            .map_err(|e| CoreError::InvalidArtifact(e.to_string()))?;
        writer.write_all(STANDARD.encode(signature.to_bytes()).as_bytes())?;
        let bytes = writer
            .finish()
            .map_err(|e| CoreError::InvalidArtifact(e.to_string()))?
            .into_inner();

        Ok(ResourceBlob::new(
            ResourceKind::Signature,
            format!("{}.sigzip", download_stem(download_name)),
            bytes,
        ))
    }

    fn verify(
        &self,
        artifact: &Path,
        signature: &Path,
        public_key: &Path,
    ) -> Result<bool, CoreError> {
        let key_text = std::fs::read_to_string(public_key)?;
        let Some(verifying_key) = parse_public_key(&key_text) else {
            tracing::warn!(path = %public_key.display(), "Unreadable public key");
            return Ok(false);
        };

        let signature_text = std::fs::read_to_string(signature)?;
        let Some(signature) = STANDARD
            .decode(signature_text.trim())
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok())
        else {
            tracing::warn!(path = %signature.display(), "Unreadable signature");
            return Ok(false);
        };

        let digest = sha256_file(artifact)?;
        Ok(verifying_key.verify(&digest, &signature).is_ok())
    }

    fn generate_key_pair(&self) -> Result<GeneratedKeyPair, CoreError> {
        let mut seed = [0u8; 32];
        rand::rng().fill(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        let public = signing_key.verifying_key().to_bytes();

        Ok(GeneratedKeyPair {
            public_id: sha256_hex(&public)[..32].to_string(),
            private_key: seed.to_vec(),
            public_key_text: public_key_pem(&public),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the signature entry from a signature archive into its own temp file.
pub fn extract_signature(signature_zip: &Path) -> Result<TempFileHandle, CoreError> {
    let file = std::fs::File::open(signature_zip)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| CoreError::InvalidArtifact(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| CoreError::InvalidArtifact(e.to_string()))?;
        if entry.name().ends_with(SIGNATURE_ENTRY_SUFFIX) {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(TempFileHandle::from_bytes(
                "extension_",
                SIGNATURE_ENTRY_SUFFIX,
                &content,
            )?);
        }
    }

    Err(CoreError::SignatureNotFound(
        signature_zip.display().to_string(),
    ))
}

/// Parse a base64 (optionally PEM-armored) Ed25519 public key.
pub fn parse_public_key(text: &str) -> Option<VerifyingKey> {
    let body: String = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = STANDARD.decode(body).ok()?;
    let raw: [u8; 32] = match der.len() {
        32 => der.as_slice().try_into().ok()?,
        44 if der[..12] == SPKI_ED25519_PREFIX => der[12..].try_into().ok()?,
        _ => return None,
    };
    VerifyingKey::from_bytes(&raw).ok()
}

/// PEM-encode a raw Ed25519 public key as SubjectPublicKeyInfo.
pub fn public_key_pem(raw: &[u8; 32]) -> String {
    let mut der = SPKI_ED25519_PREFIX.to_vec();
    der.extend_from_slice(raw);
    format!(
        "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
        STANDARD.encode(der)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
