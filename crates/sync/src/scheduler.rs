use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::digest::DigestScheduler;
use crate::puller::Puller;
use crate::reconcile::ProxyReconciler;

/// Drives the periodic jobs: outbound pulls, proxy reconciliation and
/// digest freshness passes.
#[derive(Debug)]
pub struct SyncScheduler {
    puller: Puller,
    reconciler: ProxyReconciler,
    digests: DigestScheduler,
    intervals: Intervals,
}

#[derive(Clone, Copy, Debug)]
pub struct Intervals {
    pub pull: time::Duration,
    pub proxy_check: time::Duration,
    pub digest: time::Duration,
}

impl SyncScheduler {
    #[must_use]
    pub const fn new(
        puller: Puller,
        reconciler: ProxyReconciler,
        digests: DigestScheduler,
        intervals: Intervals,
    ) -> Self {
        Self {
            puller,
            reconciler,
            digests,
            intervals,
        }
    }

    /// Runs until the task is dropped. Every job completes before the next
    /// tick of any job is handled.
    pub async fn start(self) {
        let ticker = |period| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        };

        let mut next_pull = ticker(self.intervals.pull);
        let mut next_proxy_check = ticker(self.intervals.proxy_check);
        let mut next_digest = ticker(self.intervals.digest);

        info!(intervals = ?self.intervals, "Sync scheduler started");

        loop {
            tokio::select! {
                _ = next_pull.tick() => {
                    let _results = self.puller.pull_all().await;
                }
                _ = next_proxy_check.tick() => {
                    if let Err(err) = self.reconciler.check_proxied_nodes() {
                        error!(%err, "Proxy reconciliation failed");
                    }
                }
                _ = next_digest.tick() => {
                    if let Err(err) = self.digests.update_digests() {
                        error!(%err, "Digest pass failed");
                    }
                }
            }
        }
    }
}
