//! Repository for the `signature_key_pairs` table.

use sqlx::PgPool;
use vsx_core::types::DbId;

use crate::models::signature_key_pair::SignatureKeyPair;

const COLUMNS: &str = "id, public_id, private_key, public_key_text, active, created_at";

pub struct SignatureKeyPairRepo;

impl SignatureKeyPairRepo {
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SignatureKeyPair>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM signature_key_pairs WHERE id = $1");
        sqlx::query_as::<_, SignatureKeyPair>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_active(pool: &PgPool) -> Result<Option<SignatureKeyPair>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM signature_key_pairs WHERE active = true");
        sqlx::query_as::<_, SignatureKeyPair>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Insert a key pair and make it the only active one.
    pub async fn create_active(
        pool: &PgPool,
        public_id: &str,
        private_key: &[u8],
        public_key_text: &str,
    ) -> Result<SignatureKeyPair, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE signature_key_pairs SET active = false WHERE active = true")
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO signature_key_pairs (public_id, private_key, public_key_text, active) \
             VALUES ($1, $2, $3, true) \
             RETURNING {COLUMNS}"
        );
        let key_pair = sqlx::query_as::<_, SignatureKeyPair>(&query)
            .bind(public_id)
            .bind(private_key)
            .bind(public_key_text)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(key_pair)
    }
}
