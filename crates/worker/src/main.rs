use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vsx_core::signing::{Ed25519Verifier, IntegrityVerifier};
use vsx_mirror::{HttpArtifactSource, HttpUpstreamClient, MirrorReconciler};
use vsx_pipeline::{PgRegistryStore, PublishPipeline, RegistryStore, StoreActivator};
use vsx_worker::bootstrap::{ensure_mirror_user, ensure_signing_key};
use vsx_worker::config::WorkerConfig;
use vsx_worker::sweep::MirrorSweep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vsx_worker=debug,vsx_pipeline=debug,vsx_mirror=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        upstream = %config.upstream_url,
        extensions = config.mirror_extensions.len(),
        integrity_enabled = config.integrity_enabled,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = vsx_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    vsx_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    vsx_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Pipeline ---
    let store: Arc<dyn RegistryStore> = Arc::new(PgRegistryStore::new(pool));
    let verifier: Arc<dyn IntegrityVerifier> =
        Arc::new(Ed25519Verifier::new(config.integrity_enabled));
    ensure_signing_key(store.as_ref(), verifier.as_ref()).await?;

    let activator = Arc::new(StoreActivator::new(Arc::clone(&store)));
    let pipeline = PublishPipeline::new(Arc::clone(&store), verifier, activator);

    // --- Mirror ---
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let upstream = Arc::new(HttpUpstreamClient::new(config.upstream_url.clone(), timeout)?);
    let artifacts = Arc::new(HttpArtifactSource::new(timeout)?);
    let reconciler = MirrorReconciler::new(pipeline, upstream, artifacts);

    let mirror_user = ensure_mirror_user(store.as_ref(), &config.mirror_user).await?;
    tracing::info!(login = %mirror_user.login_name, "Mirror user ready");

    let sweep = MirrorSweep::new(reconciler, config.mirror_extensions.clone(), mirror_user);
    let cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(sweep.run(
        Duration::from_secs(config.mirror_interval_secs),
        cancel.clone(),
    ));

    shutdown_signal().await;

    // --- Shutdown ---
    tracing::info!("Shutdown requested, stopping mirror sweep");
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(30), sweep_handle).await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
