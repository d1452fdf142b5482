//! GitHub App authentication.
//!
//! - [`clock`]: the clock-skew margin applied to every credential
//! - [`assertion`]: app JWTs, minted per request
//! - [`broker`]: the installation token cache with single-flight refresh

pub mod assertion;
pub mod broker;
pub mod clock;
pub mod error;

pub use assertion::{AppAssertion, AppClaims, AppIdentity};
pub use broker::{ApiSettings, Clock, CredentialBroker, MAX_REFRESH_ATTEMPTS};
pub use clock::{CLOCK_SKEW, is_too_close};
pub use error::{CredentialError, TokenIssuanceError};
