//! GitHub API access.
//!
//! - [`transport`]: the HTTP seam (`reqwest` in production, mocks in tests)
//! - [`client`]: request-signing client bound to app or installation credentials
//! - [`error`]: categorized API errors

mod client;
mod error;
mod transport;

pub use client::{Credentials, GitHubClient, RateLimit};
pub use error::{ClientError, GitHubApiError, GitHubErrorKind};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
