//! Periodic mirroring of the configured extensions.
//!
//! Each sweep mirrors every extension in order. A failing extension is
//! logged and skipped; the rest of the sweep continues. The start date of
//! the last sweep without failures is passed on as the incremental-sync
//! cutoff.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use vsx_db::models::user::User;
use vsx_mirror::{MirrorCounters, MirrorReconciler};

pub struct MirrorSweep {
    reconciler: MirrorReconciler,
    extensions: Vec<(String, String)>,
    acting_user: User,
    counters: MirrorCounters,
    last_sync: Option<NaiveDate>,
}

impl MirrorSweep {
    pub fn new(
        reconciler: MirrorReconciler,
        extensions: Vec<(String, String)>,
        acting_user: User,
    ) -> Self {
        Self {
            reconciler,
            extensions,
            acting_user,
            counters: MirrorCounters::default(),
            last_sync: None,
        }
    }

    /// Totals across every sweep so far.
    pub fn counters(&self) -> MirrorCounters {
        self.counters
    }

    /// Cutoff handed to the next sweep.
    pub fn last_sync(&self) -> Option<NaiveDate> {
        self.last_sync
    }

    /// Mirror every configured extension once. Returns the number of
    /// extensions that failed.
    pub async fn run_once(&mut self) -> usize {
        let started = Utc::now().date_naive();
        let mut failures = 0;

        for (namespace, name) in &self.extensions {
            let result = self
                .reconciler
                .mirror_extension(
                    namespace,
                    name,
                    &self.acting_user,
                    self.last_sync,
                    &mut self.counters,
                )
                .await;
            if let Err(e) = result {
                failures += 1;
                tracing::error!(namespace = %namespace, name = %name, error = %e, "Mirroring extension failed");
            }
        }

        if failures == 0 {
            self.last_sync = Some(started);
        }
        tracing::info!(
            extensions = self.extensions.len(),
            failures,
            mirrored = self.counters.mirrored,
            failed = self.counters.failed,
            deleted = self.counters.deleted,
            "Mirror sweep finished"
        );
        failures
    }

    /// Run sweeps every `interval` until `cancel` is triggered.
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        tracing::info!(
            extensions = self.extensions.len(),
            interval_secs = interval.as_secs(),
            "Mirror sweep started"
        );

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Mirror sweep stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}
