//! Fixed-cadence heartbeat loop for one broadcast lease.
//!
//! Every tick waits `interval` and then sends one heartbeat. Errors are counted
//! over the whole run (not consecutively):
//! - a transport failure counts, and once the count reaches `error_threshold`
//!   the run ends after the current tick;
//! - a 403 counts but never ends the run by itself;
//! - any other response is not an error.
//!
//! The run ends once the tick index passes `tick_budget`.

use std::time::Duration;

use presence_client::{BroadcastLease, ClientIdentity, HeartbeatOutcome, SessionClient};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    pub interval: Duration,
    pub tick_budget: u32,
    pub error_threshold: u32,
}

/// Tick index (from 1) and error count of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatState {
    pub tick: u32,
    pub errors: u32,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self { tick: 1, errors: 0 }
    }
}

impl HeartbeatState {
    pub fn is_running(&self, policy: &HeartbeatPolicy) -> bool {
        self.tick <= policy.tick_budget
    }

    /// Folds one outcome into the state. Returns `true` when the error
    /// threshold cut the run short.
    pub fn apply(&mut self, outcome: &HeartbeatOutcome, policy: &HeartbeatPolicy) -> bool {
        let mut tripped = false;
        match outcome {
            HeartbeatOutcome::Transport(_) => {
                self.errors += 1;
                if self.errors >= policy.error_threshold {
                    self.tick = policy.tick_budget;
                    tripped = true;
                }
            }
            HeartbeatOutcome::Forbidden => self.errors += 1,
            HeartbeatOutcome::Delivered { .. } => {}
        }
        self.tick = self.tick.saturating_add(1);
        tripped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    ErrorThreshold,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub ticks_sent: u32,
    pub errors: u32,
    pub stop: StopReason,
}

pub struct HeartbeatEngine {
    policy: HeartbeatPolicy,
    cancel: CancellationToken,
}

impl HeartbeatEngine {
    pub fn new(policy: HeartbeatPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(
        &self,
        client: &dyn SessionClient,
        lease: &BroadcastLease,
        identity: &ClientIdentity,
    ) -> HeartbeatReport {
        let mut state = HeartbeatState::default();
        let mut ticks_sent = 0;
        let mut stop = StopReason::BudgetExhausted;

        while state.is_running(&self.policy) {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    stop = StopReason::Cancelled;
                    break;
                }
                _ = sleep(self.policy.interval) => {}
            }

            let outcome = client.send_heartbeat(lease, identity).await;
            ticks_sent += 1;
            match &outcome {
                HeartbeatOutcome::Delivered { status } => {
                    debug!(tick = state.tick, status, "heartbeat sent");
                }
                HeartbeatOutcome::Forbidden => {
                    warn!(tick = state.tick, "heartbeat rejected with 403");
                }
                HeartbeatOutcome::Transport(err) => {
                    error!(tick = state.tick, error = %err, "heartbeat request failed");
                }
            }

            if state.apply(&outcome, &self.policy) {
                error!(
                    errors = state.errors,
                    threshold = self.policy.error_threshold,
                    "heartbeat error threshold reached; releasing lease"
                );
                stop = StopReason::ErrorThreshold;
            }
        }

        info!(
            ticks_sent,
            errors = state.errors,
            stop = ?stop,
            broadcast_id = %lease.broadcast_id,
            "heartbeat run finished"
        );
        HeartbeatReport {
            ticks_sent,
            errors: state.errors,
            stop,
        }
    }
}
