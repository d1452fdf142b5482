//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, validates signatures, and dispatches
//! them to the event router before responding. GitHub's own redelivery is
//! the only retry: a failed handler surfaces as a 500 for the delivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::webhooks::{DispatchError, DispatchOutcome, IngressError, WebhookEvent};

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery was rejected before routing.
    #[error(transparent)]
    Ingress(#[from] IngressError),

    /// A handler failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Ingress(IngressError::MissingHeader(_)) => StatusCode::BAD_REQUEST,
            WebhookError::Ingress(IngressError::InvalidSignature(_)) => StatusCode::UNAUTHORIZED,
            WebhookError::Ingress(IngressError::InvalidJson(_)) => StatusCode::BAD_REQUEST,
            WebhookError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-GitHub-Event`: Event type (e.g., "pull_request", "issue_comment")
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload
/// - Optional headers:
///   - `X-GitHub-Delivery`: Unique delivery ID, used for logging
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 OK, empty body: every matching handler succeeded
/// - 400 Bad Request: Missing header or invalid JSON
/// - 401 Unauthorized: Invalid signature
/// - 500 Internal Server Error: A handler failed
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event = WebhookEvent::from_http(&headers, &body, app_state.webhook_secret())
        .inspect_err(|e| warn!(error = %e, "Rejected webhook delivery"))?;

    debug!(
        delivery_id = ?event.delivery_id,
        event_type = %event.event_type,
        action = ?event.action(),
        "Received webhook"
    );

    match app_state.router().dispatch(&event).await? {
        DispatchOutcome::NoInstallation => {
            debug!(event_type = %event.event_type, "No installation; nothing dispatched");
        }
        DispatchOutcome::Handled(count) => {
            info!(
                delivery_id = ?event.delivery_id,
                event_type = %event.event_type,
                handlers = count,
                "Webhook handled"
            );
        }
    }
    Ok((StatusCode::OK, ""))
}
