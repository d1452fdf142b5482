//! Event routing and dispatch.
//!
//! Handlers register for an event type plus an optional restriction on one
//! payload field (e.g. `action == "opened"`). Dispatching an event resolves
//! the installation it was sent for, waits out GitHub's read-after-write
//! lag, and then runs every matching handler in registration order.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::event::WebhookEvent;
use super::payload::lookup;
use crate::auth::CredentialBroker;
use crate::config::DEFAULT_CONSISTENCY_DELAY;
use crate::github::GitHubClient;

/// Something that reacts to webhook events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event with a client acting for the event's installation.
    async fn handle(&self, event: &WebhookEvent, client: &GitHubClient) -> anyhow::Result<()>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts an async closure into an [`EventHandler`].
///
/// The closure receives owned clones of the event and client.
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(WebhookEvent, GitHubClient) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler {
        name: name.into(),
        f,
    }
}

/// See [`handler_fn`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(WebhookEvent, GitHubClient) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &WebhookEvent, client: &GitHubClient) -> anyhow::Result<()> {
        (self.f)(event.clone(), client.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Required payload values, keyed by dotted path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Restrictions(BTreeMap<String, Value>);

impl Restrictions {
    /// Matches every event of the registered type.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True iff every path resolves to a value equal to the required one.
    pub fn matches(&self, payload: &Value) -> bool {
        self.0
            .iter()
            .all(|(path, expected)| lookup(payload, path) == Some(expected))
    }
}

/// A registered handler.
#[derive(Clone)]
pub struct Route {
    pub handler: Arc<dyn EventHandler>,
    pub event_type: String,
    pub restrictions: Restrictions,
}

/// Invalid registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("at most one restriction per route is supported, got {0}")]
    TooManyRestrictions(usize),
}

/// A handler failed while processing an event.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler {handler} failed: {error:#}")]
    Handler {
        handler: String,
        error: anyhow::Error,
    },
}

/// What `dispatch` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The payload named no installation; nothing ran.
    NoInstallation,
    /// This many handlers ran, all successfully.
    Handled(usize),
}

/// Route table plus the broker used to authenticate handlers.
pub struct EventRouter {
    broker: Arc<CredentialBroker>,
    consistency_delay: Duration,
    routes: HashMap<String, Vec<Route>>,
}

impl EventRouter {
    pub fn new(broker: Arc<CredentialBroker>) -> Self {
        Self::with_consistency_delay(broker, DEFAULT_CONSISTENCY_DELAY)
    }

    pub fn with_consistency_delay(broker: Arc<CredentialBroker>, delay: Duration) -> Self {
        Self {
            broker,
            consistency_delay: delay,
            routes: HashMap::new(),
        }
    }

    pub fn broker(&self) -> &Arc<CredentialBroker> {
        &self.broker
    }

    pub fn register<H: EventHandler + 'static>(
        &mut self,
        handler: H,
        event_type: &str,
        restrictions: Restrictions,
    ) -> Result<(), RouterError> {
        self.register_shared(Arc::new(handler), event_type, restrictions)
    }

    /// Registers a handler that is also registered elsewhere.
    pub fn register_shared(
        &mut self,
        handler: Arc<dyn EventHandler>,
        event_type: &str,
        restrictions: Restrictions,
    ) -> Result<(), RouterError> {
        if restrictions.len() > 1 {
            return Err(RouterError::TooManyRestrictions(restrictions.len()));
        }
        debug!(handler = handler.name(), event_type, ?restrictions, "route registered");
        self.routes
            .entry(event_type.to_string())
            .or_default()
            .push(Route {
                handler,
                event_type: event_type.to_string(),
                restrictions,
            });
        Ok(())
    }

    /// Routes registered for `event_type`, in registration order.
    pub fn routes(&self, event_type: &str) -> &[Route] {
        self.routes.get(event_type).map_or(&[], Vec::as_slice)
    }

    /// Runs every matching handler for `event`, one at a time.
    ///
    /// The first handler error aborts the remaining handlers.
    #[instrument(skip_all, fields(event_type = %event.event_type, delivery = ?event.delivery_id))]
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<DispatchOutcome, DispatchError> {
        let Some(installation) = event.installation_id() else {
            info!("event has no installation; ignoring");
            return Ok(DispatchOutcome::NoInstallation);
        };

        // GitHub may deliver a webhook before its API reflects the change.
        if !self.consistency_delay.is_zero() {
            tokio::time::sleep(self.consistency_delay).await;
        }

        let client = self.broker.client_for(installation.clone());
        let mut handled = 0;
        for route in self.routes(&event.event_type) {
            if !route.restrictions.matches(&event.payload) {
                continue;
            }
            let handler = route.handler.name();
            debug!(handler, %installation, "invoking handler");
            if let Err(error) = route.handler.handle(event, &client).await {
                warn!(handler, error = %format!("{error:#}"), "handler failed");
                return Err(DispatchError::Handler {
                    handler: handler.to_string(),
                    error,
                });
            }
            handled += 1;
        }

        if let Some(limit) = client.rate_limit() {
            debug!(
                %installation,
                remaining = limit.remaining,
                limit = limit.limit,
                "rate limit after dispatch"
            );
        }
        Ok(DispatchOutcome::Handled(handled))
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("consistency_delay", &self.consistency_delay)
            .field("event_types", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
