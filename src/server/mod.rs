//! HTTP server for the bot.
//!
//! This module implements the HTTP server that:
//! - Accepts webhooks from GitHub, validates signatures, and dispatches them
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook/github` - Accepts GitHub webhook deliveries
//! - `GET /` - Greeting
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::{health_handler, index_handler};
pub use webhook::{WebhookError, webhook_handler};

use crate::webhooks::EventRouter;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Routes verified events to handlers.
    router: EventRouter,

    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,
}

impl AppState {
    /// Creates a new `AppState`. Registration is over once the router is
    /// handed to the server.
    pub fn new(router: EventRouter, webhook_secret: impl Into<Vec<u8>>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                router,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn router(&self) -> &EventRouter {
        &self.inner.router
    }

    /// Returns the webhook secret.
    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", get(index_handler))
        .route("/webhook/github", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
