//! Version activation.
//!
//! Activation is the last step of materialization. The registry core only
//! needs the version flipped active and the extension flag recomputed;
//! search indexing and cache eviction belong to other implementations of
//! [`Activator`].

use std::sync::Arc;

use async_trait::async_trait;
use vsx_core::error::CoreError;
use vsx_db::models::extension_version::ExtensionVersion;

use crate::store::RegistryStore;

#[async_trait]
pub trait Activator: Send + Sync {
    async fn activate(&self, version: &ExtensionVersion) -> Result<(), CoreError>;
}

/// Activates through the registry store alone.
pub struct StoreActivator {
    store: Arc<dyn RegistryStore>,
}

impl StoreActivator {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Activator for StoreActivator {
    async fn activate(&self, version: &ExtensionVersion) -> Result<(), CoreError> {
        self.store.activate_version(version.id).await?;
        let extension = self.store.refresh_extension_active(version.extension_id).await?;
        tracing::debug!(
            version_id = version.id,
            extension_id = version.extension_id,
            extension_active = extension.is_some_and(|e| e.active),
            "Activated extension version"
        );
        Ok(())
    }
}
