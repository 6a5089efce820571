use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    BroadcastLease, ClientIdentity, HeartbeatOutcome, PresenceError, Session, SessionClient,
};

/// Presence API adapter rooted at `{base_url}/broadcasts/{owner_id}`.
#[derive(Clone)]
pub struct HttpSessionClient {
    http: Client,
    base_url: Url,
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct LeaseRequest<'a> {
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct LeaseResponse {
    #[serde(default)]
    broadcast_id: Option<String>,
    #[serde(default)]
    viewer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    viewer_count: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HeartbeatRequest<'a> {
    broadcast_id: &'a str,
    viewer_token: &'a str,
}

impl HttpSessionClient {
    pub fn new(
        base_url: &str,
        owner_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PresenceError> {
        let base_url =
            Url::parse(base_url).map_err(|err| PresenceError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(PresenceError::InvalidUrl(format!(
                "{base_url} cannot be used as a base"
            )));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            owner_id: owner_id.into(),
        })
    }

    fn endpoint(&self, leaf: &str) -> Result<Url, PresenceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PresenceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["broadcasts", self.owner_id.as_str(), leaf]);
        Ok(url)
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn open_session(&self, identity: &ClientIdentity) -> Result<Session, PresenceError> {
        let res = self
            .http
            .post(self.endpoint("sessions")?)
            .header(USER_AGENT, identity.as_str())
            .send()
            .await?;
        let body: SessionResponse = read_json(res).await?;
        Ok(Session {
            session_id: required(body.session_id, "session_id")?,
            identity: identity.clone(),
        })
    }

    async fn negotiate_lease(&self, session: &Session) -> Result<BroadcastLease, PresenceError> {
        let res = self
            .http
            .post(self.endpoint("leases")?)
            .header(USER_AGENT, session.identity.as_str())
            .json(&LeaseRequest {
                session_id: &session.session_id,
            })
            .send()
            .await?;
        let body: LeaseResponse = read_json(res).await?;
        Ok(BroadcastLease {
            broadcast_id: required(body.broadcast_id, "broadcast_id")?,
            viewer_token: required(body.viewer_token, "viewer_token")?,
        })
    }

    async fn refresh_viewer_count(
        &self,
        identity: &ClientIdentity,
        lease: &BroadcastLease,
    ) -> Result<i64, PresenceError> {
        let res = self
            .http
            .get(self.endpoint("info")?)
            .header(USER_AGENT, identity.as_str())
            .query(&[("broadcast_id", lease.broadcast_id.as_str())])
            .send()
            .await?;
        let body: InfoResponse = read_json(res).await?;
        body.viewer_count
            .ok_or(PresenceError::MissingField("viewer_count"))
    }

    async fn send_heartbeat(
        &self,
        lease: &BroadcastLease,
        identity: &ClientIdentity,
    ) -> HeartbeatOutcome {
        let url = match self.endpoint("heartbeat") {
            Ok(url) => url,
            Err(err) => return HeartbeatOutcome::Transport(err.to_string()),
        };
        let sent = self
            .http
            .post(url)
            .header(USER_AGENT, identity.as_str())
            .json(&HeartbeatRequest {
                broadcast_id: &lease.broadcast_id,
                viewer_token: &lease.viewer_token,
            })
            .send()
            .await;
        match sent {
            Ok(res) if res.status() == StatusCode::FORBIDDEN => HeartbeatOutcome::Forbidden,
            Ok(res) => {
                debug!(status = %res.status(), "heartbeat response");
                HeartbeatOutcome::Delivered {
                    status: res.status().as_u16(),
                }
            }
            Err(err) => HeartbeatOutcome::Transport(err.to_string()),
        }
    }
}

async fn read_json<T>(res: Response) -> Result<T, PresenceError>
where
    T: DeserializeOwned,
{
    let status = res.status();
    if status == StatusCode::FORBIDDEN {
        return Err(PresenceError::Forbidden);
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(PresenceError::UnexpectedStatus { status, body });
    }
    let body = res.text().await?;
    serde_json::from_str(&body).map_err(|err| PresenceError::Malformed(err.to_string()))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, PresenceError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(PresenceError::MissingField(field))
}
