//! Repository for the `file_resources` table.

use sqlx::{PgConnection, PgPool};
use vsx_core::types::DbId;

use crate::models::file_resource::{CreateFileResource, FileResource};

const COLUMNS: &str = "id, extension_version_id, kind, name, content, storage, created_at";

pub struct FileResourceRepo;

impl FileResourceRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateFileResource,
    ) -> Result<FileResource, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_on(&mut conn, input).await
    }

    /// Insert a resource on an open connection, typically a transaction.
    pub async fn create_on(
        conn: &mut PgConnection,
        input: &CreateFileResource,
    ) -> Result<FileResource, sqlx::Error> {
        let query = format!(
            "INSERT INTO file_resources (extension_version_id, kind, name, content, storage) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FileResource>(&query)
            .bind(input.extension_version_id)
            .bind(&input.kind)
            .bind(&input.name)
            .bind(&input.content)
            .bind(&input.storage)
            .fetch_one(conn)
            .await
    }

    pub async fn list_for_version(
        pool: &PgPool,
        extension_version_id: DbId,
    ) -> Result<Vec<FileResource>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM file_resources WHERE extension_version_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, FileResource>(&query)
            .bind(extension_version_id)
            .fetch_all(pool)
            .await
    }

    /// Delete every resource of a version. Returns the number removed.
    pub async fn delete_for_version(
        pool: &PgPool,
        extension_version_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM file_resources WHERE extension_version_id = $1")
            .bind(extension_version_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
