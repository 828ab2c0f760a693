//! Signing key pair model.

use serde::Serialize;
use sqlx::FromRow;
use vsx_core::types::{DbId, Timestamp};

/// A row from the `signature_key_pairs` table. At most one row is active.
///
/// **Note:** `private_key` (the Ed25519 seed) is never serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SignatureKeyPair {
    pub id: DbId,
    pub public_id: String,
    #[serde(skip_serializing)]
    pub private_key: Vec<u8>,
    pub public_key_text: String,
    pub active: bool,
    pub created_at: Timestamp,
}
