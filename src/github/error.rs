//! GitHub API error types.
//!
//! A failed GitHub call is categorized so callers can decide whether trying
//! again later makes sense:
//!
//! - **Transient** errors are retriable (5xx, rate limits)
//! - **Permanent** errors need a different request or human intervention
//!   (most 4xx, including 404 and authentication failures)
//!
//! Nothing in this crate retries automatically; the categorization is
//! information for handlers.

use std::fmt;
use thiserror::Error;

use super::transport::{HttpResponse, TransportError};
use crate::auth::CredentialError;

/// The kind of GitHub API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Safe to retry after a delay (HTTP 5xx, 429, rate-limited 403).
    Transient,

    /// Retrying the same request will fail the same way.
    Permanent,
}

impl GitHubErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// GitHub answered with a non-success status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,
    pub status_code: u16,
    /// GitHub's `message` field when present, otherwise the raw body.
    pub message: String,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GitHub API error (HTTP {}): {}",
            self.status_code, self.message
        )
    }
}

impl GitHubApiError {
    /// Categorizes a failure response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let message = extract_message(&response.body);
        let rate_limited = response.header("x-ratelimit-remaining") == Some("0")
            || is_rate_limit_message(&message);

        let kind = match response.status {
            429 => GitHubErrorKind::Transient,
            403 if rate_limited => GitHubErrorKind::Transient,
            code if (500..600).contains(&code) => GitHubErrorKind::Transient,
            _ => GitHubErrorKind::Permanent,
        };

        Self {
            kind,
            status_code: response.status,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

/// Pulls the human-readable message out of a GitHub error body.
fn extract_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("abuse detection")
}

/// Everything that can go wrong when calling GitHub through a client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No credentials could be produced for the request.
    #[error("could not authenticate request: {0}")]
    Credentials(#[from] CredentialError),

    /// The request never got a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// GitHub answered with a failure status.
    #[error(transparent)]
    Api(#[from] GitHubApiError),

    /// A request or response body was not the JSON we expected.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns the API error if GitHub answered with a failure status.
    pub fn api_error(&self) -> Option<&GitHubApiError> {
        match self {
            ClientError::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_error().is_some_and(GitHubApiError::is_not_found)
    }
}
