//! Shared test doubles: a scripted transport and a broker wired to it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::auth::{ApiSettings, AppIdentity, Clock, CredentialBroker};
use crate::github::{HttpRequest, HttpResponse, Transport, TransportError};

pub const TEST_PRIVATE_KEY: &str = include_str!("../tests/fixtures/app-key.pem");
pub const TEST_API_URL: &str = "https://api.github.test";
pub const TEST_USER_AGENT: &str = "snekomatic-tests";

pub fn test_identity() -> AppIdentity {
    AppIdentity::from_pem("4242", TEST_PRIVATE_KEY).unwrap()
}

/// A broker talking to `transport`, with a fixed app identity.
pub fn test_broker(transport: Arc<MockTransport>) -> Arc<CredentialBroker> {
    Arc::new(CredentialBroker::new(
        test_identity(),
        transport,
        ApiSettings::new(TEST_API_URL, TEST_USER_AGENT),
    ))
}

/// Like [`test_broker`], but reading time from `clock`.
pub fn test_broker_with_clock(transport: Arc<MockTransport>, clock: Clock) -> Arc<CredentialBroker> {
    Arc::new(
        CredentialBroker::new(
            test_identity(),
            transport,
            ApiSettings::new(TEST_API_URL, TEST_USER_AGENT),
        )
        .with_clock(clock),
    )
}

/// A clock that stands still until moved through the returned handle.
pub fn manual_clock(start: DateTime<Utc>) -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
    let now = Arc::new(Mutex::new(start));
    let reader = Arc::clone(&now);
    (Arc::new(move || *reader.lock().unwrap()), now)
}

/// A successful `access_tokens` response.
pub fn token_response(token: &str, expires_at: DateTime<Utc>) -> HttpResponse {
    HttpResponse::json(
        201,
        &json!({
            "token": token,
            "expires_at": expires_at.to_rfc3339(),
            "permissions": {"issues": "write"},
        }),
    )
}

/// What the mock answers, and how long it takes.
pub struct MockReply {
    pub delay: Duration,
    pub response: HttpResponse,
}

impl MockReply {
    pub fn now(response: HttpResponse) -> Self {
        Self {
            delay: Duration::ZERO,
            response,
        }
    }

    pub fn after(delay: Duration, response: HttpResponse) -> Self {
        Self { delay, response }
    }
}

type Responder = dyn Fn(&HttpRequest, usize) -> MockReply + Send + Sync;

/// A transport that records every request and answers from a closure.
///
/// The closure receives the request and its zero-based index among all
/// requests seen so far.
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest, usize) -> MockReply + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A transport that fails the test if anything is sent through it.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|req, _| panic!("unexpected request: {} {}", req.method, req.url))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_matching(&self, url_fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(url_fragment))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        let reply = (self.responder)(&request, index);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        Ok(reply.response)
    }
}
