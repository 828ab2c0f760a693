//! Repository for the `access_tokens` table.

use sqlx::PgPool;
use vsx_core::types::DbId;

use crate::models::access_token::AccessToken;

const COLUMNS: &str = "id, user_id, value, description, active, created_at, accessed_at";

pub struct AccessTokenRepo;

impl AccessTokenRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AccessToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM access_tokens WHERE id = $1");
        sqlx::query_as::<_, AccessToken>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active token by its secret value and record the access.
    pub async fn find_active_by_value(
        pool: &PgPool,
        value: &str,
    ) -> Result<Option<AccessToken>, sqlx::Error> {
        let query = format!(
            "UPDATE access_tokens SET accessed_at = now() \
             WHERE value = $1 AND active = true \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccessToken>(&query)
            .bind(value)
            .fetch_optional(pool)
            .await
    }

    /// Find the user's active token with the given description.
    pub async fn find_active_by_description(
        pool: &PgPool,
        user_id: DbId,
        description: &str,
    ) -> Result<Option<AccessToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_tokens \
             WHERE user_id = $1 AND description = $2 AND active = true \
             ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, AccessToken>(&query)
            .bind(user_id)
            .bind(description)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        value: &str,
        description: &str,
    ) -> Result<AccessToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO access_tokens (user_id, value, description) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccessToken>(&query)
            .bind(user_id)
            .bind(value)
            .bind(description)
            .fetch_one(pool)
            .await
    }
}
