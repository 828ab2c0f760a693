//! Repository for the `namespace_memberships` table.

use sqlx::PgPool;
use vsx_core::types::DbId;

use crate::models::membership::NamespaceMembership;

const COLUMNS: &str = "id, namespace_id, user_id, role, created_at";

pub struct MembershipRepo;

impl MembershipRepo {
    /// Whether `user_id` holds any role in `namespace_id`.
    pub async fn exists(
        pool: &PgPool,
        namespace_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM namespace_memberships \
             WHERE namespace_id = $1 AND user_id = $2)",
        )
        .bind(namespace_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Grant `role` unless the user already has a membership.
    pub async fn ensure(
        pool: &PgPool,
        namespace_id: DbId,
        user_id: DbId,
        role: &str,
    ) -> Result<NamespaceMembership, sqlx::Error> {
        let query = format!(
            "INSERT INTO namespace_memberships (namespace_id, user_id, role) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (namespace_id, user_id) DO UPDATE SET role = namespace_memberships.role \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NamespaceMembership>(&query)
            .bind(namespace_id)
            .bind(user_id)
            .bind(role)
            .fetch_one(pool)
            .await
    }
}
