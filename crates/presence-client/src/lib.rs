//! Client contract for the broadcast presence API driven by `presence-swarm`.
//!
//! A simulated viewer needs four remote calls: open a session, negotiate a
//! watch lease, read the aggregate viewer count, and send heartbeats. They are
//! expressed as the [`SessionClient`] trait so the swarm can be exercised with
//! in-process fakes; [`HttpSessionClient`] is the production adapter.

mod http;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpSessionClient;

/// Opaque client identity sent as the `User-Agent` of every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived context tying later calls to one client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub identity: ClientIdentity,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        !self.session_id.is_empty()
    }
}

/// Broadcast id plus per-viewer token authorising heartbeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastLease {
    pub broadcast_id: String,
    pub viewer_token: String,
}

impl BroadcastLease {
    /// A lease with either half missing cannot be heartbeated.
    pub fn is_valid(&self) -> bool {
        !self.broadcast_id.is_empty() && !self.viewer_token.is_empty()
    }
}

/// Classification of a single heartbeat attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// The request completed with a status other than 403.
    Delivered { status: u16 },
    /// The server answered 403.
    Forbidden,
    /// The request never produced a response.
    Transport(String),
}

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("request rejected with 403")]
    Forbidden,
    #[error("malformed response body: {0}")]
    Malformed(String),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn open_session(&self, identity: &ClientIdentity) -> Result<Session, PresenceError>;

    async fn negotiate_lease(&self, session: &Session) -> Result<BroadcastLease, PresenceError>;

    async fn refresh_viewer_count(
        &self,
        identity: &ClientIdentity,
        lease: &BroadcastLease,
    ) -> Result<i64, PresenceError>;

    /// Never fails; the outcome is classified instead so callers can count errors.
    async fn send_heartbeat(
        &self,
        lease: &BroadcastLease,
        identity: &ClientIdentity,
    ) -> HeartbeatOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_requires_an_id() {
        let identity = ClientIdentity::new("presence-swarm/test");
        let empty = Session {
            session_id: String::new(),
            identity: identity.clone(),
        };
        let ok = Session {
            session_id: "s-1".into(),
            identity,
        };
        assert!(!empty.is_valid());
        assert!(ok.is_valid());
    }

    #[test]
    fn lease_with_one_empty_half_is_invalid() {
        let no_token = BroadcastLease {
            broadcast_id: "b-1".into(),
            viewer_token: String::new(),
        };
        let no_broadcast = BroadcastLease {
            broadcast_id: String::new(),
            viewer_token: "t-1".into(),
        };
        let both = BroadcastLease {
            broadcast_id: "b-1".into(),
            viewer_token: "t-1".into(),
        };
        assert!(!no_token.is_valid());
        assert!(!no_broadcast.is_valid());
        assert!(both.is_valid());
    }
}
