//! App assertions: short-lived JWTs proving the app's own identity.
//!
//! GitHub accepts an RS256-signed JWT whose issuer is the app ID. The
//! assertion is only used for app-level endpoints, chiefly the one that
//! exchanges it for an installation access token.
//!
//! Assertions are minted fresh for every request and never cached; minting is
//! cheaper than tracking their micro-expiry.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::clock::CLOCK_SKEW;
use crate::config::ConfigurationError;

/// Claims GitHub expects in an app JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    /// Issued at (Unix timestamp), backdated by the clock skew.
    pub iat: i64,
    /// Expiry (Unix timestamp), one clock skew into the future.
    pub exp: i64,
    /// Issuer: the GitHub App ID.
    pub iss: String,
}

/// A signed app assertion.
#[derive(Clone, PartialEq, Eq)]
pub struct AppAssertion {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AppAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppAssertion")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// The static identity of the app: its ID and private signing key.
#[derive(Clone)]
pub struct AppIdentity {
    app_id: String,
    key: EncodingKey,
}

impl AppIdentity {
    /// Builds an identity from the app ID and a PEM-encoded RSA private key.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::MissingValue` if either input is blank,
    /// `ConfigurationError::InvalidPrivateKey` if the PEM does not parse.
    pub fn from_pem(
        app_id: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, ConfigurationError> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(ConfigurationError::MissingValue("GITHUB_APP_ID"));
        }
        if private_key_pem.trim().is_empty() {
            return Err(ConfigurationError::MissingValue("GITHUB_PRIVATE_KEY"));
        }
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(ConfigurationError::InvalidPrivateKey)?;
        Ok(Self { app_id, key })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Mints an assertion valid from `now - CLOCK_SKEW` to `now + CLOCK_SKEW`.
    pub fn mint(&self, now: DateTime<Utc>) -> Result<AppAssertion, jsonwebtoken::errors::Error> {
        let issued_at = now - CLOCK_SKEW;
        let expires_at = now + CLOCK_SKEW;
        let claims = AppClaims {
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.app_id.clone(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)?;
        Ok(AppAssertion {
            token,
            issued_at,
            expires_at,
        })
    }
}

impl std::fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIdentity")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
