//! Persistence contract consumed by the publish and mirror pipelines.
//!
//! Every method maps storage failures to [`CoreError::Persistence`], except
//! [`RegistryStore::create_version`] and
//! [`RegistryStore::create_mirrored_version`] which report an identity clash
//! as [`CoreError::DuplicateVersion`].

use async_trait::async_trait;
use vsx_core::error::CoreError;
use vsx_core::naming::VersionCoordinates;
use vsx_core::signing::GeneratedKeyPair;
use vsx_core::types::DbId;
use vsx_core::TargetPlatform;
use vsx_db::models::access_token::AccessToken;
use vsx_db::models::extension::{Extension, UpdateExtensionMetadata};
use vsx_db::models::extension_version::{CreateExtensionVersion, ExtensionVersion};
use vsx_db::models::file_resource::{CreateFileResource, FileResource, NewFileResource};
use vsx_db::models::namespace::{Namespace, UpdateNamespaceMetadata};
use vsx_db::models::signature_key_pair::SignatureKeyPair;
use vsx_db::models::user::{CreateUser, User};

#[async_trait]
pub trait RegistryStore: Send + Sync {
    // -- namespaces ------------------------------------------------------------

    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError>;

    /// Return the namespace called `name`, creating it when missing.
    async fn ensure_namespace(&self, name: &str) -> Result<Namespace, CoreError>;

    async fn update_namespace_metadata(
        &self,
        namespace_id: DbId,
        metadata: &UpdateNamespaceMetadata,
    ) -> Result<(), CoreError>;

    // -- users, memberships, tokens --------------------------------------------

    /// The boolean publish-permission decision for `user_id` in `namespace_id`.
    async fn has_publish_permission(
        &self,
        user_id: DbId,
        namespace_id: DbId,
    ) -> Result<bool, CoreError>;

    async fn get_or_add_user(&self, user: &CreateUser) -> Result<User, CoreError>;

    async fn ensure_membership(
        &self,
        namespace_id: DbId,
        user_id: DbId,
        role: &str,
    ) -> Result<(), CoreError>;

    /// Find an active access token by its secret value.
    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>, CoreError>;

    /// Return the user's active token with `description`, minting one if needed.
    async fn get_or_add_access_token(
        &self,
        user_id: DbId,
        description: &str,
    ) -> Result<AccessToken, CoreError>;

    // -- extensions and versions -----------------------------------------------

    async fn find_extension(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Extension>, CoreError>;

    async fn find_version(
        &self,
        extension_id: DbId,
        version: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<ExtensionVersion>, CoreError>;

    /// Atomically create the version, creating its extension when missing.
    async fn create_version(
        &self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
    ) -> Result<ExtensionVersion, CoreError>;

    /// Atomically create an active version together with `resources`,
    /// creating its extension when missing. A failure persists nothing.
    async fn create_mirrored_version(
        &self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
        resources: &[NewFileResource],
    ) -> Result<ExtensionVersion, CoreError>;

    async fn list_versions_for_platform(
        &self,
        extension_id: DbId,
        target_platform: TargetPlatform,
    ) -> Result<Vec<ExtensionVersion>, CoreError>;

    /// Delete a version and its resources on behalf of `acting_user_id`.
    async fn delete_version(&self, version_id: DbId, acting_user_id: DbId)
        -> Result<(), CoreError>;

    async fn activate_version(&self, version_id: DbId) -> Result<(), CoreError>;

    async fn set_potentially_malicious(
        &self,
        version_id: DbId,
        flag: bool,
    ) -> Result<(), CoreError>;

    /// Recompute the extension's `active` flag from its versions.
    async fn refresh_extension_active(&self, extension_id: DbId)
        -> Result<Option<Extension>, CoreError>;

    async fn update_extension_metadata(
        &self,
        extension_id: DbId,
        metadata: &UpdateExtensionMetadata,
    ) -> Result<(), CoreError>;

    // -- file resources --------------------------------------------------------

    async fn delete_file_resources(&self, version_id: DbId) -> Result<u64, CoreError>;

    async fn insert_file_resource(
        &self,
        resource: &CreateFileResource,
    ) -> Result<FileResource, CoreError>;

    async fn list_file_resources(&self, version_id: DbId) -> Result<Vec<FileResource>, CoreError>;

    // -- signing keys ----------------------------------------------------------

    async fn find_active_key_pair(&self) -> Result<Option<SignatureKeyPair>, CoreError>;

    async fn find_key_pair(&self, id: DbId) -> Result<Option<SignatureKeyPair>, CoreError>;

    /// Persist `key_pair` as the single active pair.
    async fn insert_active_key_pair(
        &self,
        key_pair: &GeneratedKeyPair,
    ) -> Result<SignatureKeyPair, CoreError>;
}

/// Mint a fresh access token secret.
pub fn new_token_value() -> String {
    format!("vsx_{}", uuid::Uuid::new_v4().simple())
}
