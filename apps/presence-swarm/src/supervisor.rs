use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use presence_client::SessionClient;
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::{
    gauge::ViewerCountGauge,
    identity::IdentityProvider,
    worker::{WorkerLifecycle, WorkerSettings},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Number of workers to launch; labels run `viewer-1..=viewer-{target}`.
    pub target_population: u32,
    /// Inclusive bounds of the pause after each spawn.
    pub spawn_delay_secs: RangeInclusive<u64>,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnSummary {
    pub spawned: u32,
}

/// Rate-limited launcher. Workers are detached once spawned; they stop only
/// through the shared cancellation token.
pub struct PoolSupervisor {
    settings: PoolSettings,
    client: Arc<dyn SessionClient>,
    identities: Arc<dyn IdentityProvider>,
    gauge: ViewerCountGauge,
    cancel: CancellationToken,
}

impl PoolSupervisor {
    pub fn new(
        settings: PoolSettings,
        client: Arc<dyn SessionClient>,
        identities: Arc<dyn IdentityProvider>,
        gauge: ViewerCountGauge,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            client,
            identities,
            gauge,
            cancel,
        }
    }

    pub async fn run(&self) -> SpawnSummary {
        let mut spawned = 0;
        for ordinal in 1..=self.settings.target_population {
            if self.cancel.is_cancelled() {
                break;
            }
            info!(viewer_count = self.gauge.snapshot(), "current viewer count");

            let label = format!("viewer-{ordinal}");
            info!(worker = %label, "spawning worker");
            let span = info_span!("worker", label = %label);
            let worker = WorkerLifecycle::new(
                label,
                Arc::clone(&self.client),
                Arc::clone(&self.identities),
                self.gauge.clone(),
                self.settings.worker.clone(),
                self.cancel.child_token(),
            );
            tokio::spawn(worker.run().instrument(span));
            spawned += 1;

            let delay = pick_spawn_delay(&mut rand::thread_rng(), &self.settings.spawn_delay_secs);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }
        info!(spawned, target = self.settings.target_population, "spawn loop finished");
        SpawnSummary { spawned }
    }
}

pub fn pick_spawn_delay<R: Rng + ?Sized>(rng: &mut R, secs: &RangeInclusive<u64>) -> Duration {
    Duration::from_secs(rng.gen_range(secs.clone()))
}
