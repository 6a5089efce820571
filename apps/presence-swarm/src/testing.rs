use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use presence_client::{
    BroadcastLease, ClientIdentity, HeartbeatOutcome, PresenceError, Session, SessionClient,
};
use tokio::time::Instant;

use crate::identity::IdentityProvider;

/// Scripted in-process presence API.
pub struct MockClient {
    session_id: Option<String>,
    lease: (String, String),
    viewer_count: Option<i64>,
    heartbeats: Mutex<VecDeque<HeartbeatOutcome>>,
    heartbeat_fallback: HeartbeatOutcome,
    panic_on_open: bool,
    opens: AtomicUsize,
    leases: AtomicUsize,
    refreshes: AtomicUsize,
    heartbeat_times: Mutex<Vec<Instant>>,
}

impl MockClient {
    pub fn healthy() -> Self {
        Self {
            session_id: Some("s-1".into()),
            lease: ("b-1".into(), "t-1".into()),
            viewer_count: Some(42),
            heartbeats: Mutex::new(VecDeque::new()),
            heartbeat_fallback: HeartbeatOutcome::Delivered { status: 200 },
            panic_on_open: false,
            opens: AtomicUsize::new(0),
            leases: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            heartbeat_times: Mutex::new(Vec::new()),
        }
    }

    pub fn identity() -> ClientIdentity {
        ClientIdentity::new("presence-swarm/test (profile=chrome)")
    }

    /// `None` makes `open_session` fail outright.
    pub fn with_session_id(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }

    pub fn with_lease(mut self, broadcast_id: &str, viewer_token: &str) -> Self {
        self.lease = (broadcast_id.into(), viewer_token.into());
        self
    }

    pub fn with_viewer_count(mut self, count: Option<i64>) -> Self {
        self.viewer_count = count;
        self
    }

    /// Plays `script` in order, then answers every later heartbeat with `fallback`.
    pub fn with_heartbeats(
        mut self,
        script: Vec<HeartbeatOutcome>,
        fallback: HeartbeatOutcome,
    ) -> Self {
        self.heartbeats = Mutex::new(script.into());
        self.heartbeat_fallback = fallback;
        self
    }

    pub fn panicking_on_open(mut self) -> Self {
        self.panic_on_open = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn leases(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn heartbeats_sent(&self) -> usize {
        self.heartbeat_times.lock().expect("heartbeat log").len()
    }

    pub fn heartbeat_times(&self) -> Vec<Instant> {
        self.heartbeat_times.lock().expect("heartbeat log").clone()
    }
}

#[async_trait]
impl SessionClient for MockClient {
    async fn open_session(&self, identity: &ClientIdentity) -> Result<Session, PresenceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_open {
            panic!("session endpoint exploded");
        }
        let session_id = self
            .session_id
            .clone()
            .ok_or(PresenceError::MissingField("session_id"))?;
        Ok(Session {
            session_id,
            identity: identity.clone(),
        })
    }

    async fn negotiate_lease(&self, _session: &Session) -> Result<BroadcastLease, PresenceError> {
        self.leases.fetch_add(1, Ordering::SeqCst);
        Ok(BroadcastLease {
            broadcast_id: self.lease.0.clone(),
            viewer_token: self.lease.1.clone(),
        })
    }

    async fn refresh_viewer_count(
        &self,
        _identity: &ClientIdentity,
        _lease: &BroadcastLease,
    ) -> Result<i64, PresenceError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.viewer_count
            .ok_or_else(|| PresenceError::Malformed("no viewer_count".into()))
    }

    async fn send_heartbeat(
        &self,
        _lease: &BroadcastLease,
        _identity: &ClientIdentity,
    ) -> HeartbeatOutcome {
        self.heartbeat_times
            .lock()
            .expect("heartbeat log")
            .push(Instant::now());
        self.heartbeats
            .lock()
            .expect("heartbeat script")
            .pop_front()
            .unwrap_or_else(|| self.heartbeat_fallback.clone())
    }
}

pub struct FixedIdentity;

impl IdentityProvider for FixedIdentity {
    fn next_identity(&self) -> ClientIdentity {
        MockClient::identity()
    }
}
