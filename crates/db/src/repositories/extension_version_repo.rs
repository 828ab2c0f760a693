//! Repository for the `extension_versions` table.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use vsx_core::types::DbId;
use vsx_core::TargetPlatform;

use crate::models::extension_version::{CreateExtensionVersion, ExtensionVersion};
use crate::models::file_resource::NewFileResource;
use crate::repositories::FileResourceRepo;

const COLUMNS: &str = "id, extension_id, version, target_platform, pre_release, \
    display_name, description, license, homepage, repository, bugs, categories, tags, \
    dependencies, bundled_extensions, engines, timestamp, published_with, active, \
    potentially_malicious, signature_key_pair_id, created_at";

/// Name of the unique constraint guarding version identity.
pub const IDENTITY_CONSTRAINT: &str = "uq_extension_versions_identity";

pub struct ExtensionVersionRepo;

impl ExtensionVersionRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ExtensionVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM extension_versions WHERE id = $1");
        sqlx::query_as::<_, ExtensionVersion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a version by its identity triple.
    pub async fn find(
        pool: &PgPool,
        extension_id: DbId,
        version: &str,
        target_platform: TargetPlatform,
    ) -> Result<Option<ExtensionVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM extension_versions \
             WHERE extension_id = $1 AND version = $2 AND target_platform = $3"
        );
        sqlx::query_as::<_, ExtensionVersion>(&query)
            .bind(extension_id)
            .bind(version)
            .bind(target_platform.as_str())
            .fetch_optional(pool)
            .await
    }

    /// All versions of an extension built for one platform, oldest first.
    pub async fn list_for_platform(
        pool: &PgPool,
        extension_id: DbId,
        target_platform: TargetPlatform,
    ) -> Result<Vec<ExtensionVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM extension_versions \
             WHERE extension_id = $1 AND target_platform = $2 \
             ORDER BY timestamp, id"
        );
        sqlx::query_as::<_, ExtensionVersion>(&query)
            .bind(extension_id)
            .bind(target_platform.as_str())
            .fetch_all(pool)
            .await
    }

    /// Insert an inactive version, creating its extension when missing.
    ///
    /// A new extension gets `public_id`, and both its published and
    /// last-updated dates set to the version timestamp; an existing one only
    /// has its last-updated date moved. Both writes share one transaction.
    pub async fn create_with_extension(
        pool: &PgPool,
        input: &CreateExtensionVersion,
        public_id: Uuid,
    ) -> Result<ExtensionVersion, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let version = Self::insert_with_extension(&mut tx, input, public_id).await?;
        tx.commit().await?;
        Ok(version)
    }

    /// Insert an active version together with its file resources, creating
    /// its extension when missing. Everything commits or nothing does.
    pub async fn create_mirrored(
        pool: &PgPool,
        input: &CreateExtensionVersion,
        public_id: Uuid,
        resources: &[NewFileResource],
    ) -> Result<ExtensionVersion, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let version = Self::insert_with_extension(&mut tx, input, public_id).await?;

        for resource in resources {
            FileResourceRepo::create_on(&mut tx, &resource.for_version(version.id)).await?;
        }

        let query = format!(
            "UPDATE extension_versions SET active = true WHERE id = $1 RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, ExtensionVersion>(&query)
            .bind(version.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn insert_with_extension(
        conn: &mut PgConnection,
        input: &CreateExtensionVersion,
        public_id: Uuid,
    ) -> Result<ExtensionVersion, sqlx::Error> {
        let extension_id: DbId = sqlx::query_scalar(
            "INSERT INTO extensions \
                (namespace_id, name, public_id, published_date, last_updated_date) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (namespace_id, name) \
                DO UPDATE SET last_updated_date = EXCLUDED.last_updated_date \
             RETURNING id",
        )
        .bind(input.namespace_id)
        .bind(&input.extension_name)
        .bind(public_id)
        .bind(input.timestamp)
        .fetch_one(&mut *conn)
        .await?;

        let query = format!(
            "INSERT INTO extension_versions \
                (extension_id, version, target_platform, pre_release, display_name, \
                 description, license, homepage, repository, bugs, categories, tags, \
                 dependencies, bundled_extensions, engines, timestamp, published_with, \
                 signature_key_pair_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, $18) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExtensionVersion>(&query)
            .bind(extension_id)
            .bind(&input.version)
            .bind(input.target_platform.as_str())
            .bind(input.pre_release)
            .bind(&input.display_name)
            .bind(&input.description)
            .bind(&input.license)
            .bind(&input.homepage)
            .bind(&input.repository)
            .bind(&input.bugs)
            .bind(&input.categories)
            .bind(&input.tags)
            .bind(&input.dependencies)
            .bind(&input.bundled_extensions)
            .bind(&input.engines)
            .bind(input.timestamp)
            .bind(input.published_with)
            .bind(input.signature_key_pair_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Mark a version active.
    pub async fn activate(pool: &PgPool, id: DbId) -> Result<Option<ExtensionVersion>, sqlx::Error> {
        let query = format!(
            "UPDATE extension_versions SET active = true WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExtensionVersion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_potentially_malicious(
        pool: &PgPool,
        id: DbId,
        flag: bool,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE extension_versions SET potentially_malicious = $2 WHERE id = $1")
                .bind(id)
                .bind(flag)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a version together with its file resources.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM extension_versions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether any version of the extension is active.
    pub async fn has_active(pool: &PgPool, extension_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM extension_versions \
             WHERE extension_id = $1 AND active = true)",
        )
        .bind(extension_id)
        .fetch_one(pool)
        .await
    }
}
