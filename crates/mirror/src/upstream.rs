//! Catalog lookups against an upstream registry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use vsx_core::error::CoreError;
use vsx_core::TargetPlatform;

use crate::catalog::{CatalogEntry, NamespaceDetails};

/// Read access to an upstream registry's catalog.
///
/// Lookups that may legitimately miss return `Option`; `None` means the
/// upstream has no such extension, platform or namespace.
#[async_trait]
pub trait UpstreamCatalog: Send + Sync {
    /// The platform-independent "latest" view of an extension.
    async fn latest(&self, namespace: &str, name: &str)
        -> Result<Option<CatalogEntry>, CoreError>;

    async fn for_platform(
        &self,
        namespace: &str,
        name: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<CatalogEntry>, CoreError>;

    /// One specific version. The version is known to exist upstream.
    async fn version(
        &self,
        namespace: &str,
        name: &str,
        target_platform: TargetPlatform,
        version: &str,
    ) -> Result<CatalogEntry, CoreError>;

    async fn namespace_details(&self, namespace: &str)
        -> Result<Option<NamespaceDetails>, CoreError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`UpstreamCatalog`] over the registry JSON API (`{base}/api/...`).
pub struct HttpUpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(upstream_error)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn extension_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/api/{namespace}/{name}", self.base_url)
    }

    // ---- private helpers ----

    /// GET `url` as JSON, mapping 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, CoreError> {
        let response = self.client.get(url).send().await.map_err(upstream_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(url, "Upstream resource not found");
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<T>().await.map_err(upstream_error)?))
    }
}

#[async_trait]
impl UpstreamCatalog for HttpUpstreamClient {
    async fn latest(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CatalogEntry>, CoreError> {
        self.get_optional(&self.extension_url(namespace, name)).await
    }

    async fn for_platform(
        &self,
        namespace: &str,
        name: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<CatalogEntry>, CoreError> {
        let url = format!(
            "{}/{}",
            self.extension_url(namespace, name),
            target_platform.as_str()
        );
        self.get_optional(&url).await
    }

    async fn version(
        &self,
        namespace: &str,
        name: &str,
        target_platform: TargetPlatform,
        version: &str,
    ) -> Result<CatalogEntry, CoreError> {
        let url = format!(
            "{}/{}/{version}",
            self.extension_url(namespace, name),
            target_platform.as_str()
        );
        self.get_optional(&url)
            .await?
            .ok_or_else(|| CoreError::Upstream(format!("Version listed upstream but missing: {url}")))
    }

    async fn namespace_details(
        &self,
        namespace: &str,
    ) -> Result<Option<NamespaceDetails>, CoreError> {
        let url = format!("{}/api/{namespace}/details", self.base_url);
        self.get_optional(&url).await
    }
}

pub(crate) fn upstream_error(err: reqwest::Error) -> CoreError {
    CoreError::Upstream(err.to_string())
}

/// Turn a non-2xx response into an `Upstream` error carrying the body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(CoreError::Upstream(format!(
        "{url} returned HTTP {}: {body}",
        status.as_u16()
    )))
}
