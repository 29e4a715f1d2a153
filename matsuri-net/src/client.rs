//! Dialog service client.
//!
//! [`DialogService`] is the seam the rest of the workspace depends on;
//! [`HttpDialogClient`] implements it over HTTP/JSON. Every call is a single
//! attempt bounded by the configured timeout: a failed turn is simply
//! skipped by the caller, so retrying would only delay the next one.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::NetError;
use crate::types::{AgentConfigPayload, DialogResponse, HealthStatus, ResetRequest, TurnRequest};

/// Operations offered by the remote dialog service.
pub trait DialogService: Send + Sync + 'static {
    /// `GET /healthz`. Any failure reads as `Disconnected`.
    fn check_health(&self) -> impl Future<Output = HealthStatus> + Send;

    /// `GET /config/agents`.
    fn load_agent_config(&self) -> impl Future<Output = Result<AgentConfigPayload, NetError>> + Send;

    /// `POST /dialog/turn`.
    fn request_turn(&self, request: TurnRequest) -> impl Future<Output = Result<DialogResponse, NetError>> + Send;

    /// `POST /dialog/reset`. Best-effort.
    fn reset_session(&self, session_id: String) -> impl Future<Output = Result<(), NetError>> + Send;
}

/// HTTP implementation of [`DialogService`].
#[derive(Debug, Clone)]
pub struct HttpDialogClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDialogClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    /// `NetError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NetError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn transport_error(&self, err: &reqwest::Error) -> NetError {
        NetError::from_reqwest(err, self.timeout_ms())
    }

    fn success(&self, result: Result<Response, reqwest::Error>) -> Result<Response, NetError> {
        let response = result.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(NetError::Status {
                status: status.as_u16(),
            })
        }
    }

    async fn parse<T: DeserializeOwned>(&self, response: Response) -> Result<T, NetError> {
        let body = response.bytes().await.map_err(|e| self.transport_error(&e))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl DialogService for HttpDialogClient {
    async fn check_health(&self) -> HealthStatus {
        let result = self.http.get(self.url("/healthz")).send().await;
        match self.success(result) {
            Ok(_) => HealthStatus::Connected,
            Err(err) => {
                debug!(error = %err, "Health check failed");
                HealthStatus::Disconnected
            }
        }
    }

    async fn load_agent_config(&self) -> Result<AgentConfigPayload, NetError> {
        let result = self.http.get(self.url("/config/agents")).send().await;
        let response = self.success(result)?;
        let payload: AgentConfigPayload = self.parse(response).await?;
        debug!(agents = payload.agents.len(), locations = payload.locations.len(), "Agent config loaded");
        Ok(payload)
    }

    async fn request_turn(&self, request: TurnRequest) -> Result<DialogResponse, NetError> {
        let result = self
            .http
            .post(self.url("/dialog/turn"))
            .json(&request)
            .send()
            .await;
        let response = self.success(result)?;
        let reply: DialogResponse = self.parse(response).await?;
        debug!(turn = request.turn, speaker = %reply.speaker, "Dialog turn received");
        Ok(reply)
    }

    async fn reset_session(&self, session_id: String) -> Result<(), NetError> {
        let body = ResetRequest { session_id };
        let result = self
            .http
            .post(self.url("/dialog/reset"))
            .json(&body)
            .send()
            .await;
        if let Err(err) = self.success(result) {
            warn!(session = %body.session_id, error = %err, "Session reset failed");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpDialogClient::new("http://localhost:5000/", Duration::from_secs(1)).expect("client");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/healthz"), "http://localhost:5000/healthz");
    }
}
