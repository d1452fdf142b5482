//! The credential broker: app assertions and installation tokens.
//!
//! One broker per process owns the installation token cache. Clients hold an
//! `Arc` to it and ask for credentials on every request, so a long-lived client
//! keeps working across token renewals.
//!
//! # Single-flight refresh
//!
//! When a cached token is missing or about to expire, exactly one caller
//! (the *refresher*) asks GitHub for a new one. The refresher installs a
//! one-shot signal in the cache entry; everyone else who finds a stale token
//! while the signal is present waits for it and then re-checks the cache.
//!
//! The signal is the receiving half of a `watch` channel whose sender lives
//! in a [`RefreshGuard`]. Dropping the guard clears the entry's signal and
//! closes the channel, which wakes every waiter. Because it is a `Drop`, this
//! happens on success, on error, and when the refresher's future is cancelled
//! mid-request. Waiters that wake up to a still-stale token simply become the
//! next refresher.
//!
//! The cache lock is a plain `std::sync::Mutex` and is never held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use http::Method;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::assertion::{AppAssertion, AppIdentity};
use super::clock;
use super::error::{CredentialError, TokenIssuanceError};
use crate::config::{AppConfig, ConfigurationError};
use crate::github::{
    Credentials, GitHubApiError, GitHubClient, HttpRequest, HttpResponse, Transport,
    TransportError,
};
use crate::types::InstallationId;

/// Media type sent with every request.
const ACCEPT: &str = "application/vnd.github+json";

/// How many consecutive refreshes one caller performs before giving up on
/// tokens that expire within the clock skew.
pub const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Source of the current time. Every expiry decision reads it.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Where and as whom requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// REST API root without a trailing slash, e.g. `https://api.github.com`.
    pub base_url: String,
    /// GitHub rejects requests without a `User-Agent`.
    pub user_agent: String,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            user_agent: user_agent.into(),
        }
    }
}

/// Per-installation cache entry.
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
    /// Present iff a refresh is in flight.
    refresh: Option<watch::Receiver<()>>,
}

impl Default for CachedToken {
    fn default() -> Self {
        CachedToken {
            token: String::new(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
            refresh: None,
        }
    }
}

type TokenCache = Mutex<HashMap<InstallationId, CachedToken>>;

fn lock(cache: &TokenCache) -> MutexGuard<'_, HashMap<InstallationId, CachedToken>> {
    // Entries are only ever assigned whole values, so a poisoned map is still
    // consistent.
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Body of a successful `access_tokens` response (other fields ignored).
#[derive(Debug, Deserialize)]
struct IssuedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Held by the refresher for the duration of one refresh.
struct RefreshGuard<'a> {
    cache: &'a TokenCache,
    installation: InstallationId,
    /// Dropped after `drop` has cleared the entry, waking all waiters.
    _signal: watch::Sender<()>,
}

impl RefreshGuard<'_> {
    fn store(&self, issued: IssuedToken) {
        let mut cache = lock(self.cache);
        let entry = cache.entry(self.installation.clone()).or_default();
        entry.token = issued.token;
        entry.expires_at = issued.expires_at;
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if let Some(entry) = lock(self.cache).get_mut(&self.installation) {
            entry.refresh = None;
        }
    }
}

/// What `token_for` should do next, decided under the cache lock.
enum Next<'a> {
    Ready(String),
    Wait(watch::Receiver<()>),
    Refresh(RefreshGuard<'a>),
}

/// Mints app assertions and brokers installation access tokens.
pub struct CredentialBroker {
    identity: AppIdentity,
    transport: Arc<dyn Transport>,
    settings: ApiSettings,
    tokens: TokenCache,
    clock: Clock,
}

impl CredentialBroker {
    pub fn new(identity: AppIdentity, transport: Arc<dyn Transport>, settings: ApiSettings) -> Self {
        Self {
            identity,
            transport,
            settings,
            tokens: Mutex::new(HashMap::new()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock, e.g. to age cached tokens in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Builds a broker from process configuration.
    ///
    /// # Errors
    ///
    /// Fails if the app ID or private key is missing or unusable.
    pub fn from_config(
        config: &AppConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        let identity = AppIdentity::from_pem(&config.app_id, &config.private_key)?;
        let settings = ApiSettings::new(&config.api_url, &config.user_agent);
        Ok(Self::new(identity, transport, settings))
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// A client that authenticates as the app itself.
    pub fn app_client(self: &Arc<Self>) -> GitHubClient {
        GitHubClient::new(Arc::clone(self), Credentials::App)
    }

    /// A client that authenticates as the given installation.
    ///
    /// No token is fetched here; each request resolves one when it is sent.
    pub fn client_for(self: &Arc<Self>, installation: InstallationId) -> GitHubClient {
        GitHubClient::new(Arc::clone(self), Credentials::Installation(installation))
    }

    /// Mints a fresh app assertion. Never cached.
    pub fn mint_app_assertion(&self) -> Result<AppAssertion, CredentialError> {
        Ok(self.identity.mint(self.now())?)
    }

    /// Returns a token for `installation` that is not within the clock skew
    /// of expiring, refreshing it if necessary.
    ///
    /// Concurrent callers for the same installation share one refresh.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure if this caller performed the refresh.
    /// Callers that were waiting on a failed refresh retry it themselves.
    #[instrument(skip_all, fields(installation = %installation))]
    pub async fn token_for(&self, installation: &InstallationId) -> Result<String, CredentialError> {
        let mut attempts = 0;
        loop {
            match self.next_step(installation) {
                Next::Ready(token) => return Ok(token),
                Next::Wait(mut signal) => {
                    debug!("token renewal already in progress; waiting");
                    // Err only means the refresher is gone, which is exactly
                    // what we are waiting for.
                    let _ = signal.changed().await;
                }
                Next::Refresh(guard) => {
                    attempts += 1;
                    info!(attempt = attempts, "renewing installation token");
                    let issued = self.request_installation_token(installation).await?;
                    let expires_at = issued.expires_at;
                    guard.store(issued);
                    drop(guard);

                    if clock::is_too_close(expires_at, self.now()) {
                        warn!(%expires_at, "renewed token already expires within the clock skew");
                        if attempts >= MAX_REFRESH_ATTEMPTS {
                            return Err(TokenIssuanceError::ExpiresTooSoon {
                                installation: installation.clone(),
                                expires_at,
                                attempts,
                            }
                            .into());
                        }
                    } else {
                        info!(%expires_at, "installation token renewed");
                    }
                }
            }
        }
    }

    fn next_step(&self, installation: &InstallationId) -> Next<'_> {
        let now = self.now();
        let mut cache = lock(&self.tokens);
        let entry = cache.entry(installation.clone()).or_default();

        if !clock::is_too_close(entry.expires_at, now) {
            return Next::Ready(entry.token.clone());
        }
        if let Some(signal) = &entry.refresh {
            return Next::Wait(signal.clone());
        }

        let (sender, receiver) = watch::channel(());
        entry.refresh = Some(receiver);
        Next::Refresh(RefreshGuard {
            cache: &self.tokens,
            installation: installation.clone(),
            _signal: sender,
        })
    }

    async fn request_installation_token(
        &self,
        installation: &InstallationId,
    ) -> Result<IssuedToken, CredentialError> {
        let assertion = self.mint_app_assertion()?;
        let url = self.api_url(&format!("/app/installations/{installation}/access_tokens"));

        let response = self
            .send(
                Method::POST,
                &url,
                bearer(&assertion),
                Some(b"{}".to_vec()),
            )
            .await
            .map_err(|source| TokenIssuanceError::Transport {
                installation: installation.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(TokenIssuanceError::Rejected {
                installation: installation.clone(),
                source: GitHubApiError::from_response(&response),
            }
            .into());
        }

        let issued = serde_json::from_slice::<IssuedToken>(&response.body).map_err(|source| {
            TokenIssuanceError::MalformedResponse {
                installation: installation.clone(),
                source,
            }
        })?;
        Ok(issued)
    }

    /// Produces the `Authorization` header value for a request.
    pub(crate) async fn authorization(
        &self,
        credentials: &Credentials,
    ) -> Result<String, CredentialError> {
        match credentials {
            Credentials::App => Ok(bearer(&self.mint_app_assertion()?)),
            Credentials::Installation(id) => Ok(format!("token {}", self.token_for(id).await?)),
        }
    }

    /// Resolves a path against the API root. Absolute URLs (as found in
    /// webhook payloads) pass through unchanged.
    pub fn api_url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("https://") || path_or_url.starts_with("http://") {
            path_or_url.to_string()
        } else {
            format!(
                "{}/{}",
                self.settings.base_url,
                path_or_url.trim_start_matches('/')
            )
        }
    }

    /// Sends a request with the standard GitHub headers.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        authorization: String,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, TransportError> {
        let mut headers = vec![
            ("accept".to_string(), ACCEPT.to_string()),
            ("user-agent".to_string(), self.settings.user_agent.clone()),
            ("authorization".to_string(), authorization),
        ];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }

        self.transport
            .send(HttpRequest {
                method,
                url: url.to_string(),
                headers,
                body: body.unwrap_or_default(),
            })
            .await
    }
}

fn bearer(assertion: &AppAssertion) -> String {
    format!("Bearer {}", assertion.token)
}

impl std::fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("identity", &self.identity)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::time::Duration;

    use crate::test_utils::{MockReply, MockTransport, test_broker, token_response};

    const TOKEN_PATH: &str = "/app/installations/7/access_tokens";

    fn installation() -> InstallationId {
        InstallationId::from(7)
    }

    fn issued(token: &str, valid_for: TimeDelta) -> HttpResponse {
        token_response(token, Utc::now() + valid_for)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let transport = MockTransport::new(|_, _| {
            MockReply::after(Duration::from_millis(50), issued("tok-1", TimeDelta::hours(1)))
        });
        let broker = test_broker(transport.clone());
        let id = installation();

        let calls = (0..10).map(|_| broker.token_for(&id));
        let tokens = futures::future::join_all(calls).await;

        assert_eq!(transport.count_matching(TOKEN_PATH), 1);
        for token in tokens {
            assert_eq!(token.unwrap(), "tok-1");
        }
    }

    #[tokio::test]
    async fn cached_token_is_reused() {
        let transport =
            MockTransport::new(|_, n| MockReply::now(issued(&format!("tok-{n}"), TimeDelta::hours(1))));
        let broker = test_broker(transport.clone());
        let id = installation();

        assert_eq!(broker.token_for(&id).await.unwrap(), "tok-0");
        assert_eq!(broker.token_for(&id).await.unwrap(), "tok-0");
        assert_eq!(transport.count_matching(TOKEN_PATH), 1);
    }

    #[tokio::test]
    async fn installations_are_cached_independently() {
        let transport = MockTransport::new(|req, _| {
            let token = if req.url.contains("/installations/1/") { "one" } else { "two" };
            MockReply::now(issued(token, TimeDelta::hours(1)))
        });
        let broker = test_broker(transport.clone());

        assert_eq!(broker.token_for(&InstallationId::from(1)).await.unwrap(), "one");
        assert_eq!(broker.token_for(&InstallationId::from(2)).await.unwrap(), "two");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn token_inside_skew_is_refreshed_again() {
        // First refresh yields a token that is already "too close"; it must
        // not be returned, and a second refresh must happen immediately.
        let transport = MockTransport::new(|_, n| {
            if n == 0 {
                MockReply::now(issued("short", TimeDelta::seconds(30)))
            } else {
                MockReply::now(issued("long", TimeDelta::hours(1)))
            }
        });
        let broker = test_broker(transport.clone());

        assert_eq!(broker.token_for(&installation()).await.unwrap(), "long");
        assert_eq!(transport.count_matching(TOKEN_PATH), 2);
    }

    #[tokio::test]
    async fn gives_up_when_tokens_keep_expiring_too_soon() {
        let transport =
            MockTransport::new(|_, _| MockReply::now(issued("short", TimeDelta::seconds(10))));
        let broker = test_broker(transport.clone());

        let err = broker.token_for(&installation()).await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::TokenIssuance(TokenIssuanceError::ExpiresTooSoon {
                attempts: MAX_REFRESH_ATTEMPTS,
                ..
            })
        ));
        assert_eq!(
            transport.count_matching(TOKEN_PATH),
            MAX_REFRESH_ATTEMPTS as usize
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_retry_after_failed_refresh() {
        let transport = MockTransport::new(|_, n| {
            let response = if n == 0 {
                HttpResponse::json(502, &serde_json::json!({"message": "Bad Gateway"}))
            } else {
                issued("recovered", TimeDelta::hours(1))
            };
            MockReply::after(Duration::from_millis(20), response)
        });
        let broker = test_broker(transport.clone());
        let id = installation();

        let (first, second) = tokio::join!(broker.token_for(&id), broker.token_for(&id));

        assert!(matches!(
            first,
            Err(CredentialError::TokenIssuance(
                TokenIssuanceError::Rejected { .. }
            ))
        ));
        assert_eq!(second.unwrap(), "recovered");
        assert_eq!(transport.count_matching(TOKEN_PATH), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_refresher_does_not_strand_waiters() {
        let transport = MockTransport::new(|_, n| {
            if n == 0 {
                MockReply::after(Duration::from_secs(3600), issued("never", TimeDelta::hours(1)))
            } else {
                MockReply::now(issued("fresh", TimeDelta::hours(1)))
            }
        });
        let broker = test_broker(transport.clone());
        let id = installation();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), broker.token_for(&id)).await;
        assert!(abandoned.is_err(), "first refresh should have timed out");

        // The dropped refresher must have cleared its signal, otherwise this
        // would wait forever.
        let token = tokio::time::timeout(Duration::from_secs(5), broker.token_for(&id))
            .await
            .expect("second caller was stranded")
            .unwrap();
        assert_eq!(token, "fresh");
    }

    #[tokio::test]
    async fn malformed_token_response_is_issuance_error() {
        let transport = MockTransport::new(|_, _| {
            MockReply::now(HttpResponse::json(201, &serde_json::json!({"token": "x"})))
        });
        let broker = test_broker(transport);

        let err = broker.token_for(&installation()).await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::TokenIssuance(TokenIssuanceError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn token_request_is_signed_with_app_assertion() {
        let transport =
            MockTransport::new(|_, _| MockReply::now(issued("tok", TimeDelta::hours(1))));
        let broker = test_broker(transport.clone());

        broker.token_for(&installation()).await.unwrap();

        let requests = transport.requests();
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.url,
            "https://api.github.test/app/installations/7/access_tokens"
        );
        assert!(request.header("authorization").unwrap().starts_with("Bearer "));
        assert_eq!(request.header("user-agent"), Some("snekomatic-tests"));
        assert_eq!(request.header("accept"), Some(ACCEPT));
    }

    #[test]
    fn api_url_joins_relative_paths() {
        let broker = test_broker(MockTransport::new(|_, _| {
            MockReply::now(HttpResponse::json(200, &serde_json::json!({})))
        }));
        assert_eq!(
            broker.api_url("/orgs/python-trio/memberships/someone"),
            "https://api.github.test/orgs/python-trio/memberships/someone"
        );
        assert_eq!(broker.api_url("app"), "https://api.github.test/app");
        assert_eq!(
            broker.api_url("https://api.github.com/repos/a/b/issues/1/comments"),
            "https://api.github.com/repos/a/b/issues/1/comments"
        );
    }
}
