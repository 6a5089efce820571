use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use presence_client::SessionClient;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    gauge::ViewerCountGauge,
    heartbeat::{HeartbeatEngine, HeartbeatPolicy, HeartbeatReport},
    identity::IdentityProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub heartbeat: HeartbeatPolicy,
    /// Pause between iterations, applied on every exit path.
    pub restart_delay: Duration,
}

/// How a single session/lease/heartbeat iteration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    SessionUnavailable,
    LeaseUnavailable,
    Completed(HeartbeatReport),
}

/// One simulated viewer. Runs iterations back to back until cancelled.
pub struct WorkerLifecycle {
    label: String,
    client: Arc<dyn SessionClient>,
    identities: Arc<dyn IdentityProvider>,
    gauge: ViewerCountGauge,
    settings: WorkerSettings,
    cancel: CancellationToken,
}

impl WorkerLifecycle {
    pub fn new(
        label: impl Into<String>,
        client: Arc<dyn SessionClient>,
        identities: Arc<dyn IdentityProvider>,
        gauge: ViewerCountGauge,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            label: label.into(),
            client,
            identities,
            gauge,
            settings,
            cancel,
        }
    }

    pub async fn run(self) {
        let mut iteration: u64 = 0;
        while !self.cancel.is_cancelled() {
            iteration += 1;
            match AssertUnwindSafe(self.run_iteration()).catch_unwind().await {
                Ok(IterationOutcome::Completed(report)) => {
                    info!(
                        worker = %self.label,
                        iteration,
                        ticks_sent = report.ticks_sent,
                        "heartbeat run complete"
                    );
                }
                Ok(outcome) => {
                    debug!(worker = %self.label, iteration, ?outcome, "iteration aborted");
                }
                Err(panic) => {
                    error!(
                        worker = %self.label,
                        iteration,
                        panic = %panic_message(panic.as_ref()),
                        "worker iteration panicked"
                    );
                }
            }

            info!(worker = %self.label, "starting next session");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.settings.restart_delay) => {}
            }
        }
        info!(worker = %self.label, iterations = iteration, "worker stopped");
    }

    /// Identity, session, lease, count refresh, heartbeats. Each step gates the next.
    pub async fn run_iteration(&self) -> IterationOutcome {
        let identity = self.identities.next_identity();
        debug!(worker = %self.label, identity = %identity, "selected client identity");

        let session = match self.client.open_session(&identity).await {
            Ok(session) if session.is_valid() => session,
            Ok(_) => {
                warn!(worker = %self.label, "session id missing; abandoning iteration");
                return IterationOutcome::SessionUnavailable;
            }
            Err(err) => {
                warn!(worker = %self.label, error = %err, "failed to open session");
                return IterationOutcome::SessionUnavailable;
            }
        };
        debug!(worker = %self.label, session_id = %session.session_id, "session opened");

        let lease = match self.client.negotiate_lease(&session).await {
            Ok(lease) if lease.is_valid() => lease,
            Ok(lease) => {
                warn!(
                    worker = %self.label,
                    has_broadcast_id = !lease.broadcast_id.is_empty(),
                    has_viewer_token = !lease.viewer_token.is_empty(),
                    "incomplete lease; abandoning iteration"
                );
                return IterationOutcome::LeaseUnavailable;
            }
            Err(err) => {
                warn!(worker = %self.label, error = %err, "failed to negotiate lease");
                return IterationOutcome::LeaseUnavailable;
            }
        };
        debug!(worker = %self.label, broadcast_id = %lease.broadcast_id, "lease negotiated");

        match self.client.refresh_viewer_count(&identity, &lease).await {
            Ok(count) => self.gauge.record(count),
            Err(err) => debug!(worker = %self.label, error = %err, "viewer count refresh failed"),
        }

        let report = HeartbeatEngine::new(self.settings.heartbeat)
            .with_cancellation(self.cancel.clone())
            .run(self.client.as_ref(), &lease, &identity)
            .await;
        IterationOutcome::Completed(report)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
