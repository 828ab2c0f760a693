//! Repository for the `users` table.

use sqlx::PgPool;
use vsx_core::types::DbId;

use crate::models::user::{CreateUser, User};

const COLUMNS: &str = "id, provider, login_name, full_name, avatar_url, homepage, created_at";

/// Provides lookup and upsert operations for users.
pub struct UserRepo;

impl UserRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_login(
        pool: &PgPool,
        provider: &str,
        login_name: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE provider = $1 AND login_name = $2");
        sqlx::query_as::<_, User>(&query)
            .bind(provider)
            .bind(login_name)
            .fetch_optional(pool)
            .await
    }

    /// Return the user identified by `(provider, login_name)`, creating it
    /// from `input` when missing. Existing profile fields are not touched.
    pub async fn get_or_create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (provider, login_name, full_name, avatar_url, homepage) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (provider, login_name) DO UPDATE SET login_name = EXCLUDED.login_name \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.provider)
            .bind(&input.login_name)
            .bind(&input.full_name)
            .bind(&input.avatar_url)
            .bind(&input.homepage)
            .fetch_one(pool)
            .await
    }
}
