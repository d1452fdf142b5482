//! Credential errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::github::{GitHubApiError, TransportError};
use crate::types::InstallationId;

/// Exchanging an app assertion for an installation token failed.
///
/// The cache entry is left stale, so any later `token_for` call (including
/// the ones that were waiting on the failed refresh) tries again.
#[derive(Debug, Error)]
pub enum TokenIssuanceError {
    #[error("token request for installation {installation} failed: {source}")]
    Transport {
        installation: InstallationId,
        #[source]
        source: TransportError,
    },

    #[error("GitHub refused to issue a token for installation {installation}: {source}")]
    Rejected {
        installation: InstallationId,
        #[source]
        source: GitHubApiError,
    },

    #[error("malformed token response for installation {installation}: {source}")]
    MalformedResponse {
        installation: InstallationId,
        #[source]
        source: serde_json::Error,
    },

    /// GitHub kept handing out tokens that expire within the clock skew.
    #[error(
        "token for installation {installation} expires at {expires_at}, too soon to use after {attempts} attempts"
    )]
    ExpiresTooSoon {
        installation: InstallationId,
        expires_at: DateTime<Utc>,
        attempts: u32,
    },
}

/// No credentials could be produced for a request.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to sign app assertion: {0}")]
    Assertion(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    TokenIssuance(#[from] TokenIssuanceError),
}
