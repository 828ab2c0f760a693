//! Repository for the `extensions` table.

use sqlx::PgPool;
use vsx_core::types::DbId;

use crate::models::extension::{Extension, UpdateExtensionMetadata};

const COLUMNS: &str = "id, namespace_id, name, public_id, active, published_date, \
    last_updated_date, average_rating, review_count, download_count, deprecated, \
    downloadable, created_at";

/// Same columns qualified with the `e.` alias, for joins.
const JOINED_COLUMNS: &str = "e.id, e.namespace_id, e.name, e.public_id, e.active, \
    e.published_date, e.last_updated_date, e.average_rating, e.review_count, \
    e.download_count, e.deprecated, e.downloadable, e.created_at";

pub struct ExtensionRepo;

impl ExtensionRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Extension>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM extensions WHERE id = $1");
        sqlx::query_as::<_, Extension>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an extension by `namespace.name`. Names match case-insensitively.
    pub async fn find_by_name(
        pool: &PgPool,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Extension>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM extensions e \
             JOIN namespaces n ON n.id = e.namespace_id \
             WHERE lower(n.name) = lower($1) AND lower(e.name) = lower($2)"
        );
        sqlx::query_as::<_, Extension>(&query)
            .bind(namespace)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Recompute the `active` flag from the extension's versions.
    pub async fn refresh_active(pool: &PgPool, id: DbId) -> Result<Option<Extension>, sqlx::Error> {
        let query = format!(
            "UPDATE extensions SET active = EXISTS(\
                 SELECT 1 FROM extension_versions v \
                 WHERE v.extension_id = extensions.id AND v.active = true) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Extension>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite popularity and lifecycle fields. Absent fields keep their value.
    pub async fn update_metadata(
        pool: &PgPool,
        id: DbId,
        input: &UpdateExtensionMetadata,
    ) -> Result<Option<Extension>, sqlx::Error> {
        let query = format!(
            "UPDATE extensions SET \
                 average_rating = COALESCE($2, average_rating), \
                 review_count = COALESCE($3, review_count), \
                 download_count = COALESCE($4, download_count), \
                 deprecated = COALESCE($5, deprecated), \
                 downloadable = COALESCE($6, downloadable) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Extension>(&query)
            .bind(id)
            .bind(input.average_rating)
            .bind(input.review_count)
            .bind(input.download_count)
            .bind(input.deprecated)
            .bind(input.downloadable)
            .fetch_optional(pool)
            .await
    }
}
