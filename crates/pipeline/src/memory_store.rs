//! In-process [`RegistryStore`] backed by plain vectors.
//!
//! Mirrors the constraints of the PostgreSQL schema (identity uniqueness,
//! one download and one signature per version, cascading deletes) so the
//! pipelines can be exercised without a database. Seeding and inspection
//! helpers are inherent methods.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use vsx_core::error::CoreError;
use vsx_core::naming::VersionCoordinates;
use vsx_core::resource::ResourceKind;
use vsx_core::signing::GeneratedKeyPair;
use vsx_core::types::{DbId, Timestamp};
use vsx_core::TargetPlatform;
use vsx_db::models::access_token::AccessToken;
use vsx_db::models::extension::{Extension, UpdateExtensionMetadata};
use vsx_db::models::extension_version::{CreateExtensionVersion, ExtensionVersion};
use vsx_db::models::file_resource::{CreateFileResource, FileResource, NewFileResource};
use vsx_db::models::membership::{NamespaceMembership, ROLE_OWNER};
use vsx_db::models::namespace::{Namespace, UpdateNamespaceMetadata};
use vsx_db::models::signature_key_pair::SignatureKeyPair;
use vsx_db::models::user::{CreateUser, User};

use crate::store::{new_token_value, RegistryStore};

#[derive(Clone, Default)]
struct MemoryState {
    last_id: DbId,
    namespaces: Vec<Namespace>,
    users: Vec<User>,
    memberships: Vec<NamespaceMembership>,
    tokens: Vec<AccessToken>,
    extensions: Vec<Extension>,
    versions: Vec<ExtensionVersion>,
    resources: Vec<FileResource>,
    key_pairs: Vec<SignatureKeyPair>,
    /// `(version_id, acting_user_id)` of every deletion.
    deletions: Vec<(DbId, DbId)>,
    failing_resource_inserts: usize,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn insert_namespace(&mut self, name: &str) -> Namespace {
        let now = Utc::now();
        let namespace = Namespace {
            id: self.next_id(),
            name: name.to_string(),
            display_name: None,
            description: None,
            website: None,
            support_link: None,
            logo_url: None,
            extension_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.namespaces.push(namespace.clone());
        namespace
    }

    fn insert_token(&mut self, user_id: DbId, value: &str, description: &str) -> AccessToken {
        let token = AccessToken {
            id: self.next_id(),
            user_id,
            value: value.to_string(),
            description: description.to_string(),
            active: true,
            created_at: Utc::now(),
            accessed_at: None,
        };
        self.tokens.push(token.clone());
        token
    }

    fn create_version(
        &mut self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
    ) -> Result<ExtensionVersion, CoreError> {
        let existing = self
            .extensions
            .iter()
            .position(|e| e.namespace_id == input.namespace_id && e.name == input.extension_name);

        if let Some(index) = existing {
            let extension_id = self.extensions[index].id;
            if let Some(duplicate) = self.versions.iter().find(|v| {
                v.extension_id == extension_id
                    && v.version == input.version
                    && v.target_platform == input.target_platform
            }) {
                return Err(CoreError::DuplicateVersion {
                    id: coordinates.to_log_format(),
                    active: duplicate.active,
                });
            }
        }

        let extension_id = match existing {
            Some(index) => {
                self.extensions[index].last_updated_date = input.timestamp;
                self.extensions[index].id
            }
            None => {
                let extension = Extension {
                    id: self.next_id(),
                    namespace_id: input.namespace_id,
                    name: input.extension_name.clone(),
                    public_id: Uuid::new_v4(),
                    active: false,
                    published_date: input.timestamp,
                    last_updated_date: input.timestamp,
                    average_rating: None,
                    review_count: 0,
                    download_count: 0,
                    deprecated: false,
                    downloadable: true,
                    created_at: Utc::now(),
                };
                let id = extension.id;
                self.extensions.push(extension);
                id
            }
        };

        let version = ExtensionVersion {
            id: self.next_id(),
            extension_id,
            version: input.version.clone(),
            target_platform: input.target_platform,
            pre_release: input.pre_release,
            display_name: input.display_name.clone(),
            description: input.description.clone(),
            license: input.license.clone(),
            homepage: input.homepage.clone(),
            repository: input.repository.clone(),
            bugs: input.bugs.clone(),
            categories: input.categories.clone(),
            tags: input.tags.clone(),
            dependencies: input.dependencies.clone(),
            bundled_extensions: input.bundled_extensions.clone(),
            engines: input.engines.clone(),
            timestamp: input.timestamp,
            published_with: input.published_with,
            active: false,
            potentially_malicious: false,
            signature_key_pair_id: input.signature_key_pair_id,
            created_at: Utc::now(),
        };
        self.versions.push(version.clone());
        Ok(version)
    }

    fn insert_resource(&mut self, resource: &CreateFileResource) -> Result<FileResource, CoreError> {
        if self.failing_resource_inserts > 0 {
            self.failing_resource_inserts -= 1;
            return Err(CoreError::Persistence(
                "injected resource insert failure".to_string(),
            ));
        }

        let singular = resource
            .kind
            .parse::<ResourceKind>()
            .is_ok_and(ResourceKind::is_singular);
        if singular
            && self.resources.iter().any(|r| {
                r.extension_version_id == resource.extension_version_id && r.kind == resource.kind
            })
        {
            return Err(CoreError::Persistence(format!(
                "Version {} already has a '{}' resource",
                resource.extension_version_id, resource.kind
            )));
        }

        let created = FileResource {
            id: self.next_id(),
            extension_version_id: resource.extension_version_id,
            kind: resource.kind.clone(),
            name: resource.name.clone(),
            content: resource.content.clone(),
            storage: resource.storage.clone(),
            created_at: Utc::now(),
        };
        self.resources.push(created.clone());
        Ok(created)
    }

    fn create_mirrored_version(
        &mut self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
        resources: &[NewFileResource],
    ) -> Result<ExtensionVersion, CoreError> {
        let mut version = self.create_version(coordinates, input)?;
        for resource in resources {
            self.insert_resource(&resource.for_version(version.id))?;
        }
        if let Some(stored) = self.versions.iter_mut().find(|v| v.id == version.id) {
            stored.active = true;
        }
        version.active = true;
        Ok(version)
    }

    fn find_extension(&self, namespace: &str, name: &str) -> Option<&Extension> {
        let namespace = self
            .namespaces
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(namespace))?;
        self.extensions
            .iter()
            .find(|e| e.namespace_id == namespace.id && e.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- seeding ---------------------------------------------------------------

    pub fn add_namespace(&self, name: &str) -> Namespace {
        self.state().insert_namespace(name)
    }

    pub fn add_user(&self, provider: &str, login_name: &str) -> User {
        let mut state = self.state();
        let user = User {
            id: state.next_id(),
            provider: provider.to_string(),
            login_name: login_name.to_string(),
            full_name: None,
            avatar_url: None,
            homepage: None,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        user
    }

    pub fn add_membership(&self, namespace_id: DbId, user_id: DbId) {
        let mut state = self.state();
        let membership = NamespaceMembership {
            id: state.next_id(),
            namespace_id,
            user_id,
            role: ROLE_OWNER.to_string(),
            created_at: Utc::now(),
        };
        state.memberships.push(membership);
    }

    pub fn add_token(&self, user_id: DbId, value: &str) -> AccessToken {
        self.state().insert_token(user_id, value, "")
    }

    /// Make the next `count` resource inserts fail with a persistence error.
    pub fn fail_next_resource_inserts(&self, count: usize) {
        self.state().failing_resource_inserts = count;
    }

    /// Overwrite an extension's last-updated date.
    pub fn set_last_updated(&self, extension_id: DbId, date: Timestamp) {
        let mut state = self.state();
        if let Some(extension) = state.extensions.iter_mut().find(|e| e.id == extension_id) {
            extension.last_updated_date = date;
        }
    }

    // -- inspection ------------------------------------------------------------

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state().namespaces.iter().find(|n| n.name == name).cloned()
    }

    pub fn extension(&self, namespace: &str, name: &str) -> Option<Extension> {
        self.state().find_extension(namespace, name).cloned()
    }

    /// Every stored version, in insertion order.
    pub fn versions(&self) -> Vec<ExtensionVersion> {
        self.state().versions.clone()
    }

    pub fn resources(&self, version_id: DbId) -> Vec<FileResource> {
        self.state()
            .resources
            .iter()
            .filter(|r| r.extension_version_id == version_id)
            .cloned()
            .collect()
    }

    pub fn users(&self) -> Vec<User> {
        self.state().users.clone()
    }

    pub fn memberships(&self) -> Vec<NamespaceMembership> {
        self.state().memberships.clone()
    }

    /// `(version_id, acting_user_id)` of every deletion, in order.
    pub fn deletions(&self) -> Vec<(DbId, DbId)> {
        self.state().deletions.clone()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
        Ok(self.namespace(name))
    }

    async fn ensure_namespace(&self, name: &str) -> Result<Namespace, CoreError> {
        let mut state = self.state();
        if let Some(namespace) = state.namespaces.iter().find(|n| n.name == name) {
            return Ok(namespace.clone());
        }
        Ok(state.insert_namespace(name))
    }

    async fn update_namespace_metadata(
        &self,
        namespace_id: DbId,
        metadata: &UpdateNamespaceMetadata,
    ) -> Result<(), CoreError> {
        let mut state = self.state();
        if let Some(namespace) = state.namespaces.iter_mut().find(|n| n.id == namespace_id) {
            if metadata.display_name.is_some() {
                namespace.display_name = metadata.display_name.clone();
            }
            if metadata.description.is_some() {
                namespace.description = metadata.description.clone();
            }
            if metadata.website.is_some() {
                namespace.website = metadata.website.clone();
            }
            if metadata.support_link.is_some() {
                namespace.support_link = metadata.support_link.clone();
            }
            if metadata.logo_url.is_some() {
                namespace.logo_url = metadata.logo_url.clone();
            }
            if let Some(count) = metadata.extension_count {
                namespace.extension_count = count;
            }
            namespace.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn has_publish_permission(
        &self,
        user_id: DbId,
        namespace_id: DbId,
    ) -> Result<bool, CoreError> {
        Ok(self
            .state()
            .memberships
            .iter()
            .any(|m| m.namespace_id == namespace_id && m.user_id == user_id))
    }

    async fn get_or_add_user(&self, user: &CreateUser) -> Result<User, CoreError> {
        let mut state = self.state();
        if let Some(existing) = state
            .users
            .iter()
            .find(|u| u.provider == user.provider && u.login_name == user.login_name)
        {
            return Ok(existing.clone());
        }
        let created = User {
            id: state.next_id(),
            provider: user.provider.clone(),
            login_name: user.login_name.clone(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
            homepage: user.homepage.clone(),
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn ensure_membership(
        &self,
        namespace_id: DbId,
        user_id: DbId,
        role: &str,
    ) -> Result<(), CoreError> {
        let mut state = self.state();
        let exists = state
            .memberships
            .iter()
            .any(|m| m.namespace_id == namespace_id && m.user_id == user_id);
        if !exists {
            let membership = NamespaceMembership {
                id: state.next_id(),
                namespace_id,
                user_id,
                role: role.to_string(),
                created_at: Utc::now(),
            };
            state.memberships.push(membership);
        }
        Ok(())
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>, CoreError> {
        let mut state = self.state();
        let token = state
            .tokens
            .iter_mut()
            .find(|t| t.value == value && t.active)
            .map(|t| {
                t.accessed_at = Some(Utc::now());
                t.clone()
            });
        Ok(token)
    }

    async fn get_or_add_access_token(
        &self,
        user_id: DbId,
        description: &str,
    ) -> Result<AccessToken, CoreError> {
        let mut state = self.state();
        if let Some(token) = state
            .tokens
            .iter()
            .find(|t| t.user_id == user_id && t.description == description && t.active)
        {
            return Ok(token.clone());
        }
        Ok(state.insert_token(user_id, &new_token_value(), description))
    }

    async fn find_extension(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Extension>, CoreError> {
        Ok(self.extension(namespace, name))
    }

    async fn find_version(
        &self,
        extension_id: DbId,
        version: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<ExtensionVersion>, CoreError> {
        Ok(self
            .state()
            .versions
            .iter()
            .find(|v| {
                v.extension_id == extension_id
                    && v.version == version
                    && v.target_platform == target_platform
            })
            .cloned())
    }

    async fn create_version(
        &self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
    ) -> Result<ExtensionVersion, CoreError> {
        self.state().create_version(coordinates, input)
    }

    async fn create_mirrored_version(
        &self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
        resources: &[NewFileResource],
    ) -> Result<ExtensionVersion, CoreError> {
        let mut state = self.state();
        let snapshot = state.clone();
        let result = state.create_mirrored_version(coordinates, input, resources);
        if result.is_err() {
            // Roll back, but keep injected failures consumed.
            let failing_resource_inserts = state.failing_resource_inserts;
            *state = snapshot;
            state.failing_resource_inserts = failing_resource_inserts;
        }
        result
    }

    async fn list_versions_for_platform(
        &self,
        extension_id: DbId,
        target_platform: TargetPlatform,
    ) -> Result<Vec<ExtensionVersion>, CoreError> {
        let mut versions: Vec<ExtensionVersion> = self
            .state()
            .versions
            .iter()
            .filter(|v| v.extension_id == extension_id && v.target_platform == target_platform)
            .cloned()
            .collect();
        versions.sort_by_key(|v| (v.timestamp, v.id));
        Ok(versions)
    }

    async fn delete_version(
        &self,
        version_id: DbId,
        acting_user_id: DbId,
    ) -> Result<(), CoreError> {
        let mut state = self.state();
        state.versions.retain(|v| v.id != version_id);
        state.resources.retain(|r| r.extension_version_id != version_id);
        state.deletions.push((version_id, acting_user_id));
        Ok(())
    }

    async fn activate_version(&self, version_id: DbId) -> Result<(), CoreError> {
        let mut state = self.state();
        if let Some(version) = state.versions.iter_mut().find(|v| v.id == version_id) {
            version.active = true;
        }
        Ok(())
    }

    async fn set_potentially_malicious(
        &self,
        version_id: DbId,
        flag: bool,
    ) -> Result<(), CoreError> {
        let mut state = self.state();
        if let Some(version) = state.versions.iter_mut().find(|v| v.id == version_id) {
            version.potentially_malicious = flag;
        }
        Ok(())
    }

    async fn refresh_extension_active(
        &self,
        extension_id: DbId,
    ) -> Result<Option<Extension>, CoreError> {
        let mut state = self.state();
        let active = state
            .versions
            .iter()
            .any(|v| v.extension_id == extension_id && v.active);
        Ok(state
            .extensions
            .iter_mut()
            .find(|e| e.id == extension_id)
            .map(|extension| {
                extension.active = active;
                extension.clone()
            }))
    }

    async fn update_extension_metadata(
        &self,
        extension_id: DbId,
        metadata: &UpdateExtensionMetadata,
    ) -> Result<(), CoreError> {
        let mut state = self.state();
        if let Some(extension) = state.extensions.iter_mut().find(|e| e.id == extension_id) {
            if metadata.average_rating.is_some() {
                extension.average_rating = metadata.average_rating;
            }
            if let Some(count) = metadata.review_count {
                extension.review_count = count;
            }
            if let Some(count) = metadata.download_count {
                extension.download_count = count;
            }
            if let Some(deprecated) = metadata.deprecated {
                extension.deprecated = deprecated;
            }
            if let Some(downloadable) = metadata.downloadable {
                extension.downloadable = downloadable;
            }
        }
        Ok(())
    }

    async fn delete_file_resources(&self, version_id: DbId) -> Result<u64, CoreError> {
        let mut state = self.state();
        let before = state.resources.len();
        state.resources.retain(|r| r.extension_version_id != version_id);
        Ok((before - state.resources.len()) as u64)
    }

    async fn insert_file_resource(
        &self,
        resource: &CreateFileResource,
    ) -> Result<FileResource, CoreError> {
        self.state().insert_resource(resource)
    }

    async fn list_file_resources(&self, version_id: DbId) -> Result<Vec<FileResource>, CoreError> {
        Ok(self.resources(version_id))
    }

    async fn find_active_key_pair(&self) -> Result<Option<SignatureKeyPair>, CoreError> {
        Ok(self.state().key_pairs.iter().find(|k| k.active).cloned())
    }

    async fn find_key_pair(&self, id: DbId) -> Result<Option<SignatureKeyPair>, CoreError> {
        Ok(self.state().key_pairs.iter().find(|k| k.id == id).cloned())
    }

    async fn insert_active_key_pair(
        &self,
        key_pair: &GeneratedKeyPair,
    ) -> Result<SignatureKeyPair, CoreError> {
        let mut state = self.state();
        for existing in state.key_pairs.iter_mut() {
            existing.active = false;
        }
        let created = SignatureKeyPair {
            id: state.next_id(),
            public_id: key_pair.public_id.clone(),
            private_key: key_pair.private_key.clone(),
            public_key_text: key_pair.public_key_text.clone(),
            active: true,
            created_at: Utc::now(),
        };
        state.key_pairs.push(created.clone());
        Ok(created)
    }
}
