//! Fetching extension archives and checking their signatures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tokio::io::AsyncWriteExt;
use vsx_core::error::CoreError;
use vsx_core::naming::{last_path_segment, ARCHIVE_EXTENSION};
use vsx_core::signing::{extract_signature, IntegrityVerifier};
use vsx_core::TempFileHandle;

use crate::upstream::{ensure_success, upstream_error};

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// The authoritative location of `url`: the `Location` it redirects to.
    async fn resolve_location(&self, url: &str) -> Result<String, CoreError>;

    /// Download `url` into a fresh temp file named `<prefix>XXXX<suffix>`.
    async fn download(
        &self,
        url: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<TempFileHandle, CoreError>;
}

/// [`ArtifactSource`] over HTTP.
pub struct HttpArtifactSource {
    client: reqwest::Client,
    non_redirecting: reqwest::Client,
}

impl HttpArtifactSource {
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(upstream_error)?;
        let non_redirecting = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(upstream_error)?;
        Ok(Self {
            client,
            non_redirecting,
        })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn resolve_location(&self, url: &str) -> Result<String, CoreError> {
        let response = self
            .non_redirecting
            .head(url)
            .send()
            .await
            .map_err(upstream_error)?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                CoreError::ResolutionError(format!("No location header returned for {url}"))
            })?;
        let resolved = response.url().join(location).map_err(|e| {
            CoreError::ResolutionError(format!("Invalid location '{location}' for {url}: {e}"))
        })?;
        Ok(resolved.to_string())
    }

    async fn download(
        &self,
        url: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<TempFileHandle, CoreError> {
        let response = self.client.get(url).send().await.map_err(upstream_error)?;
        let mut response = ensure_success(response).await?;

        let file = TempFileHandle::new(prefix, suffix)?;
        let mut out = tokio::fs::File::create(file.path()).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(upstream_error)? {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        tracing::debug!(url, bytes = written, "Downloaded upstream file");
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// File name of a resolved archive location. Must carry the archive
/// extension.
pub fn artifact_file_name(location: &str) -> Result<&str, CoreError> {
    let file_name = last_path_segment(location);
    if !file_name.ends_with(ARCHIVE_EXTENSION) {
        return Err(CoreError::InvalidArtifact(format!(
            "Invalid archive file name in location: {location}"
        )));
    }
    Ok(file_name)
}

/// Verify `artifact` against the signature inside `signature_zip`.
///
/// Fails with `SignatureNotFound` when the bundle holds no signature entry
/// and with `UnverifiedArtifact` when verification does not pass.
pub fn verify_artifact_signature(
    verifier: &dyn IntegrityVerifier,
    extension: &str,
    artifact: &TempFileHandle,
    signature_zip: &TempFileHandle,
    public_key: &TempFileHandle,
) -> Result<(), CoreError> {
    let signature = extract_signature(signature_zip.path())?;
    if !verifier.verify(artifact.path(), signature.path(), public_key.path())? {
        return Err(CoreError::UnverifiedArtifact(extension.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
