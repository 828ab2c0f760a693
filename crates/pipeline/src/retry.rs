//! Retrying materialization with a fixed backoff schedule.

use std::time::Duration;

use vsx_core::error::CoreError;
use vsx_core::TempFileHandle;

use crate::publish::{release_artifact, Download, MaterializeOutcome, PublishPipeline};

/// Delays between materialization attempts (exponential backoff).
pub const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// Materialize `download`, retrying on failure per [`RETRY_DELAYS_SECS`].
pub async fn materialize_with_retry(
    pipeline: &PublishPipeline,
    download: &Download,
    artifact: TempFileHandle,
) -> Result<MaterializeOutcome, CoreError> {
    let delays = RETRY_DELAYS_SECS.map(Duration::from_secs);
    materialize_with_delays(pipeline, download, artifact, &delays).await
}

/// Like [`materialize_with_retry`] with an explicit schedule: one attempt per
/// delay plus a final attempt. The artifact is released after the last one.
pub async fn materialize_with_delays(
    pipeline: &PublishPipeline,
    download: &Download,
    artifact: TempFileHandle,
    delays: &[Duration],
) -> Result<MaterializeOutcome, CoreError> {
    let extension = download.coordinates.to_log_format();

    for (attempt, delay) in delays.iter().enumerate() {
        match pipeline.rebuild_resources(download, &artifact).await {
            Ok(outcome) => {
                release_artifact(artifact);
                return Ok(outcome);
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    extension = %extension,
                    error = %e,
                    "Materialization attempt failed, retrying"
                );
                tokio::time::sleep(*delay).await;
            }
        }
    }

    // Final attempt after the last backoff.
    let result = pipeline.rebuild_resources(download, &artifact).await;
    if let Err(e) = &result {
        tracing::error!(extension = %extension, error = %e, "Materialization failed after all retries");
    }
    release_artifact(artifact);
    result
}
