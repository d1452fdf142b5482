//! Request-signing GitHub client.
//!
//! A `GitHubClient` is a cheap handle onto the shared [`CredentialBroker`],
//! bound to one set of credentials: the app itself or a single installation.
//! Credentials are resolved inside every request rather than when the client
//! is built, so a client kept around for hours keeps working as tokens are
//! renewed.

use std::sync::{Arc, Mutex, PoisonError};

use http::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use super::error::{ClientError, GitHubApiError};
use super::transport::HttpResponse;
use crate::auth::CredentialBroker;
use crate::types::InstallationId;

/// Who a request is made as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credentials {
    /// The app itself, authenticated with a freshly minted assertion.
    App,
    /// An installation, authenticated with its cached access token.
    Installation(InstallationId),
}

/// Rate-limit reading from the most recent response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
}

impl RateLimit {
    fn from_response(response: &HttpResponse) -> Option<Self> {
        let parse = |name: &str| response.header(name)?.trim().parse::<u64>().ok();
        Some(RateLimit {
            limit: parse("x-ratelimit-limit")?,
            remaining: parse("x-ratelimit-remaining")?,
        })
    }
}

/// A GitHub API client bound to one set of credentials.
#[derive(Clone)]
pub struct GitHubClient {
    broker: Arc<CredentialBroker>,
    credentials: Credentials,
    rate_limit: Arc<Mutex<Option<RateLimit>>>,
}

impl GitHubClient {
    pub fn new(broker: Arc<CredentialBroker>, credentials: Credentials) -> Self {
        Self {
            broker,
            credentials,
            rate_limit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The installation this client acts for, if any.
    pub fn installation(&self) -> Option<&InstallationId> {
        match &self.credentials {
            Credentials::Installation(id) => Some(id),
            Credentials::App => None,
        }
    }

    /// The rate limit reported by the last response seen through this client
    /// (or any of its clones).
    pub fn rate_limit(&self) -> Option<RateLimit> {
        *self
            .rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends a request and decodes the JSON response.
    ///
    /// `path_or_url` may be an API path (`/orgs/{org}`) or an absolute URL
    /// taken from a webhook payload. Returns `Value::Null` for empty bodies
    /// (e.g. `204 No Content`).
    ///
    /// # Errors
    ///
    /// - [`ClientError::Credentials`] if no token or assertion could be produced
    /// - [`ClientError::Transport`] if no response arrived
    /// - [`ClientError::Api`] for non-2xx statuses
    /// - [`ClientError::InvalidJson`] if a 2xx body is not JSON
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path_or_url: &str,
        body: Option<&B>,
    ) -> Result<Value, ClientError> {
        let url = self.broker.api_url(path_or_url);
        let body = body.map(serde_json::to_vec).transpose()?;
        let authorization = self.broker.authorization(&self.credentials).await?;

        debug!(%method, %url, "GitHub request");
        let response = self
            .broker
            .send(method, &url, authorization, body)
            .await?;
        trace!(status = response.status, "GitHub response");

        if let Some(limit) = RateLimit::from_response(&response) {
            *self
                .rate_limit
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(limit);
        }

        if !response.is_success() {
            return Err(GitHubApiError::from_response(&response).into());
        }
        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn get(&self, path_or_url: &str) -> Result<Value, ClientError> {
        self.request::<Value>(Method::GET, path_or_url, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path_or_url: &str,
        body: &B,
    ) -> Result<Value, ClientError> {
        self.request(Method::POST, path_or_url, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path_or_url: &str,
        body: &B,
    ) -> Result<Value, ClientError> {
        self.request(Method::PUT, path_or_url, Some(body)).await
    }

    pub async fn delete(&self, path_or_url: &str) -> Result<Value, ClientError> {
        self.request::<Value>(Method::DELETE, path_or_url, None).await
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
