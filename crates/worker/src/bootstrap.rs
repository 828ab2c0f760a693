//! Setup performed once at startup.

use vsx_core::error::CoreError;
use vsx_core::signing::IntegrityVerifier;
use vsx_db::models::user::{CreateUser, User};
use vsx_pipeline::RegistryStore;

/// Provider recorded for users the worker creates for itself.
pub const SYSTEM_PROVIDER: &str = "system";

/// Make sure an active signing key pair exists when signing is enabled.
pub async fn ensure_signing_key(
    store: &dyn RegistryStore,
    verifier: &dyn IntegrityVerifier,
) -> Result<(), CoreError> {
    if !verifier.is_enabled() {
        tracing::info!("Extension signing disabled");
        return Ok(());
    }
    if let Some(existing) = store.find_active_key_pair().await? {
        tracing::info!(public_id = %existing.public_id, "Using active signing key pair");
        return Ok(());
    }

    let generated = verifier.generate_key_pair()?;
    let stored = store.insert_active_key_pair(&generated).await?;
    tracing::info!(public_id = %stored.public_id, "Generated signing key pair");
    Ok(())
}

/// The local user mirror operations act as, created when missing.
pub async fn ensure_mirror_user(store: &dyn RegistryStore, login: &str) -> Result<User, CoreError> {
    store
        .get_or_add_user(&CreateUser {
            provider: SYSTEM_PROVIDER.to_string(),
            login_name: login.to_string(),
            full_name: None,
            avatar_url: None,
            homepage: None,
        })
        .await
}
