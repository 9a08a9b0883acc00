use chrono::{DateTime, Utc};
use metashare_storage::StorageManager;
use tracing::{debug, error, info};

use crate::config::DigestConfig;
use crate::error::SyncError;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DigestReport {
    pub checked: usize,
    /// Checked objects whose stored digest was stale.
    pub changed: usize,
    /// Objects checked recently enough to be left alone.
    pub skipped: usize,
    pub failed: usize,
}

/// Periodically re-verifies stored digests.
#[derive(Clone, Debug)]
pub struct DigestScheduler {
    storage: StorageManager,
    config: DigestConfig,
}

impl DigestScheduler {
    #[must_use]
    pub const fn new(storage: StorageManager, config: DigestConfig) -> Self {
        Self { storage, config }
    }

    pub fn update_digests(&self) -> Result<DigestReport, SyncError> {
        self.run_at(Utc::now())
    }

    /// A freshness pass as if the clock read `now`.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<DigestReport, SyncError> {
        let threshold = chrono::Duration::milliseconds(
            i64::try_from(self.config.check_threshold().as_millis()).unwrap_or(i64::MAX),
        );

        let mut report = DigestReport::default();

        for object in self.storage.list()? {
            if !object.publication_status.is_materialized() {
                continue;
            }

            let id = object.identifier;

            if let Some(checked) = object.digest_last_checked {
                if now.signed_duration_since(checked) <= threshold {
                    report.skipped += 1;
                    continue;
                }
            }

            match self.storage.refresh_digest(&id, now) {
                Ok(changed) => {
                    debug!(%id, changed, "Digest verified");

                    report.checked += 1;

                    if changed {
                        report.changed += 1;
                    }
                }
                Err(err) => {
                    error!(%id, %err, "Failed to verify digest");
                    report.failed += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            changed = report.changed,
            skipped = report.skipped,
            failed = report.failed,
            "Digest pass finished"
        );

        Ok(report)
    }
}
