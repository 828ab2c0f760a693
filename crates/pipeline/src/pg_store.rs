//! PostgreSQL implementation of [`RegistryStore`] on top of the `vsx-db`
//! repositories.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
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
use vsx_db::repositories::extension_version_repo::IDENTITY_CONSTRAINT;
use vsx_db::repositories::{
    AccessTokenRepo, ExtensionRepo, ExtensionVersionRepo, FileResourceRepo, MembershipRepo,
    NamespaceRepo, SignatureKeyPairRepo, UserRepo,
};

use crate::store::{new_token_value, RegistryStore};

/// PostgreSQL error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

fn persistence(err: sqlx::Error) -> CoreError {
    CoreError::Persistence(err.to_string())
}

fn is_identity_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(IDENTITY_CONSTRAINT)
        }
        _ => false,
    }
}

/// An identity clash means a concurrent publish of the same version won.
fn version_write_error(coordinates: &VersionCoordinates, err: sqlx::Error) -> CoreError {
    if is_identity_violation(&err) {
        CoreError::DuplicateVersion {
            id: coordinates.to_log_format(),
            active: false,
        }
    } else {
        persistence(err)
    }
}

pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RegistryStore for PgRegistryStore {
    async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>, CoreError> {
        NamespaceRepo::find_by_name(&self.pool, name)
            .await
            .map_err(persistence)
    }

    async fn ensure_namespace(&self, name: &str) -> Result<Namespace, CoreError> {
        NamespaceRepo::get_or_create(&self.pool, name)
            .await
            .map_err(persistence)
    }

    async fn update_namespace_metadata(
        &self,
        namespace_id: DbId,
        metadata: &UpdateNamespaceMetadata,
    ) -> Result<(), CoreError> {
        NamespaceRepo::update_metadata(&self.pool, namespace_id, metadata)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn has_publish_permission(
        &self,
        user_id: DbId,
        namespace_id: DbId,
    ) -> Result<bool, CoreError> {
        MembershipRepo::exists(&self.pool, namespace_id, user_id)
            .await
            .map_err(persistence)
    }

    async fn get_or_add_user(&self, user: &CreateUser) -> Result<User, CoreError> {
        UserRepo::get_or_create(&self.pool, user)
            .await
            .map_err(persistence)
    }

    async fn ensure_membership(
        &self,
        namespace_id: DbId,
        user_id: DbId,
        role: &str,
    ) -> Result<(), CoreError> {
        MembershipRepo::ensure(&self.pool, namespace_id, user_id, role)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>, CoreError> {
        AccessTokenRepo::find_active_by_value(&self.pool, value)
            .await
            .map_err(persistence)
    }

    async fn get_or_add_access_token(
        &self,
        user_id: DbId,
        description: &str,
    ) -> Result<AccessToken, CoreError> {
        if let Some(token) =
            AccessTokenRepo::find_active_by_description(&self.pool, user_id, description)
                .await
                .map_err(persistence)?
        {
            return Ok(token);
        }
        AccessTokenRepo::create(&self.pool, user_id, &new_token_value(), description)
            .await
            .map_err(persistence)
    }

    async fn find_extension(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Extension>, CoreError> {
        ExtensionRepo::find_by_name(&self.pool, namespace, name)
            .await
            .map_err(persistence)
    }

    async fn find_version(
        &self,
        extension_id: DbId,
        version: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<ExtensionVersion>, CoreError> {
        ExtensionVersionRepo::find(&self.pool, extension_id, version, target_platform)
            .await
            .map_err(persistence)
    }

    async fn create_version(
        &self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
    ) -> Result<ExtensionVersion, CoreError> {
        ExtensionVersionRepo::create_with_extension(&self.pool, input, Uuid::new_v4())
            .await
            .map_err(|err| version_write_error(coordinates, err))
    }

    async fn create_mirrored_version(
        &self,
        coordinates: &VersionCoordinates,
        input: &CreateExtensionVersion,
        resources: &[NewFileResource],
    ) -> Result<ExtensionVersion, CoreError> {
        ExtensionVersionRepo::create_mirrored(&self.pool, input, Uuid::new_v4(), resources)
            .await
            .map_err(|err| version_write_error(coordinates, err))
    }

    async fn list_versions_for_platform(
        &self,
        extension_id: DbId,
        target_platform: TargetPlatform,
    ) -> Result<Vec<ExtensionVersion>, CoreError> {
        ExtensionVersionRepo::list_for_platform(&self.pool, extension_id, target_platform)
            .await
            .map_err(persistence)
    }

    async fn delete_version(
        &self,
        version_id: DbId,
        acting_user_id: DbId,
    ) -> Result<(), CoreError> {
        let deleted = ExtensionVersionRepo::delete(&self.pool, version_id)
            .await
            .map_err(persistence)?;
        tracing::info!(version_id, acting_user_id, deleted, "Deleted extension version");
        Ok(())
    }

    async fn activate_version(&self, version_id: DbId) -> Result<(), CoreError> {
        ExtensionVersionRepo::activate(&self.pool, version_id)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn set_potentially_malicious(
        &self,
        version_id: DbId,
        flag: bool,
    ) -> Result<(), CoreError> {
        ExtensionVersionRepo::set_potentially_malicious(&self.pool, version_id, flag)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn refresh_extension_active(
        &self,
        extension_id: DbId,
    ) -> Result<Option<Extension>, CoreError> {
        ExtensionRepo::refresh_active(&self.pool, extension_id)
            .await
            .map_err(persistence)
    }

    async fn update_extension_metadata(
        &self,
        extension_id: DbId,
        metadata: &UpdateExtensionMetadata,
    ) -> Result<(), CoreError> {
        ExtensionRepo::update_metadata(&self.pool, extension_id, metadata)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn delete_file_resources(&self, version_id: DbId) -> Result<u64, CoreError> {
        FileResourceRepo::delete_for_version(&self.pool, version_id)
            .await
            .map_err(persistence)
    }

    async fn insert_file_resource(
        &self,
        resource: &CreateFileResource,
    ) -> Result<FileResource, CoreError> {
        FileResourceRepo::create(&self.pool, resource)
            .await
            .map_err(persistence)
    }

    async fn list_file_resources(&self, version_id: DbId) -> Result<Vec<FileResource>, CoreError> {
        FileResourceRepo::list_for_version(&self.pool, version_id)
            .await
            .map_err(persistence)
    }

    async fn find_active_key_pair(&self) -> Result<Option<SignatureKeyPair>, CoreError> {
        SignatureKeyPairRepo::find_active(&self.pool)
            .await
            .map_err(persistence)
    }

    async fn find_key_pair(&self, id: DbId) -> Result<Option<SignatureKeyPair>, CoreError> {
        SignatureKeyPairRepo::find_by_id(&self.pool, id)
            .await
            .map_err(persistence)
    }

    async fn insert_active_key_pair(
        &self,
        key_pair: &GeneratedKeyPair,
    ) -> Result<SignatureKeyPair, CoreError> {
        SignatureKeyPairRepo::create_active(
            &self.pool,
            &key_pair.public_id,
            &key_pair.private_key,
            &key_pair.public_key_text,
        )
        .await
        .map_err(persistence)
    }
}
