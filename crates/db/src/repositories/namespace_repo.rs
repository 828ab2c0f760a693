//! Repository for the `namespaces` table.

use sqlx::PgPool;
use vsx_core::types::DbId;

use crate::models::namespace::{Namespace, UpdateNamespaceMetadata};

const COLUMNS: &str = "id, name, display_name, description, website, support_link, \
    logo_url, extension_count, created_at, updated_at";

/// Provides lookup and upsert operations for namespaces.
pub struct NamespaceRepo;

impl NamespaceRepo {
    /// Find a namespace by its unique name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Namespace>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM namespaces WHERE name = $1");
        sqlx::query_as::<_, Namespace>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Return the namespace called `name`, creating it when missing.
    pub async fn get_or_create(pool: &PgPool, name: &str) -> Result<Namespace, sqlx::Error> {
        let query = format!(
            "INSERT INTO namespaces (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Namespace>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Overwrite the descriptive fields. Absent fields keep their value.
    pub async fn update_metadata(
        pool: &PgPool,
        id: DbId,
        input: &UpdateNamespaceMetadata,
    ) -> Result<Option<Namespace>, sqlx::Error> {
        let query = format!(
            "UPDATE namespaces SET \
                 display_name = COALESCE($2, display_name), \
                 description = COALESCE($3, description), \
                 website = COALESCE($4, website), \
                 support_link = COALESCE($5, support_link), \
                 logo_url = COALESCE($6, logo_url), \
                 extension_count = COALESCE($7, extension_count), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Namespace>(&query)
            .bind(id)
            .bind(&input.display_name)
            .bind(&input.description)
            .bind(&input.website)
            .bind(&input.support_link)
            .bind(&input.logo_url)
            .bind(input.extension_count)
            .fetch_optional(pool)
            .await
    }
}
