//! reqwest-backed [`Transport`] for the construction-management backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use sitelog_core::{ApiResponse, SessionStore, TOKEN_KEY, clear_credentials};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportError};

/// HTTP transport for the backend's JSON API.
///
/// Reads the bearer token from the session store on every request, so a
/// login or logout elsewhere takes effect immediately. A 401 clears the
/// session's credentials.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

impl HttpTransport {
    /// Create a transport for the given base URL.
    ///
    /// `base_url` should be like `https://api.example.com` (a trailing slash
    /// is trimmed).
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse, TransportError> {
        let request = match self.session.get(TOKEN_KEY) {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await?;
        let status = resp.status();
        debug!(method, status = status.as_u16(), url = %resp.url(), "backend responded");

        if status == StatusCode::UNAUTHORIZED {
            warn!(method, "backend rejected credentials");
            clear_credentials(self.session.as_ref());
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        info!(url = %url, "GET");
        self.send("GET", self.client.get(&url)).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        info!(url = %url, "POST");
        self.send("POST", self.client.post(&url).json(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
        let url = self.url(path);
        info!(url = %url, "PUT");
        self.send("PUT", self.client.put(&url).json(body)).await
    }
}
