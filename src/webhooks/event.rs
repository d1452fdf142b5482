//! Decoded webhook deliveries.

use std::collections::HashMap;

use http::HeaderMap;
use serde_json::Value;
use thiserror::Error;

use super::payload::lookup;
use super::signature::{SignatureError, verify_signature};
use crate::types::{DeliveryId, InstallationId};

/// Header name for GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
pub const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Why a delivery was rejected before routing.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// One verified webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub delivery_id: Option<DeliveryId>,
    pub payload: Value,
    /// Request headers, names lowercased.
    pub headers: HashMap<String, String>,
}

impl WebhookEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            delivery_id: None,
            payload,
            headers: HashMap::new(),
        }
    }

    /// Verifies and decodes an HTTP delivery.
    ///
    /// The signature is checked over the raw body before any JSON parsing.
    pub fn from_http(headers: &HeaderMap, body: &[u8], secret: &[u8]) -> Result<Self, IngressError> {
        let event_type = get_header(headers, HEADER_EVENT)
            .ok_or(IngressError::MissingHeader(HEADER_EVENT))?
            .to_string();
        let signature = get_header(headers, HEADER_SIGNATURE)
            .ok_or(IngressError::MissingHeader(HEADER_SIGNATURE))?;

        verify_signature(body, signature, secret)?;
        let payload: Value = serde_json::from_slice(body)?;

        let headers: HashMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_ascii_lowercase(), value.to_str().ok()?.to_string()))
            })
            .collect();

        Ok(Self {
            delivery_id: get_header_map(&headers, HEADER_DELIVERY).map(DeliveryId::new),
            event_type,
            payload,
            headers,
        })
    }

    /// The `action` field, present on most event types.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action")?.as_str()
    }

    /// The installation this delivery was sent for, from `installation.id`.
    pub fn installation_id(&self) -> Option<InstallationId> {
        InstallationId::from_json(lookup(&self.payload, "installation.id")?)
    }
}

fn get_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn get_header_map(headers: &HashMap<String, String>, name: &str) -> Option<String> {
    headers.get(name).filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::signature::{compute_signature, format_signature_header};
    use http::HeaderValue;

    const SECRET: &[u8] = b"webhook-secret";

    fn signed_headers(event: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, HeaderValue::from_str(event).unwrap());
        headers.insert(HEADER_DELIVERY, HeaderValue::from_static("abc-123"));
        headers.insert(
            HEADER_SIGNATURE,
            HeaderValue::from_str(&format_signature_header(&compute_signature(body, SECRET)))
                .unwrap(),
        );
        headers
    }

    #[test]
    fn decodes_signed_delivery() {
        let body = br#"{"action":"opened","installation":{"id":7}}"#;
        let event = WebhookEvent::from_http(&signed_headers("issues", body), body, SECRET).unwrap();

        assert_eq!(event.event_type, "issues");
        assert_eq!(event.delivery_id, Some(DeliveryId::new("abc-123")));
        assert_eq!(event.action(), Some("opened"));
        assert_eq!(event.installation_id(), Some(InstallationId::from(7)));
        assert_eq!(event.headers.get("x-github-delivery").map(String::as_str), Some("abc-123"));
    }

    #[test]
    fn missing_event_header() {
        let body = b"{}";
        let mut headers = signed_headers("issues", body);
        headers.remove(HEADER_EVENT);
        let err = WebhookEvent::from_http(&headers, body, SECRET).unwrap_err();
        assert!(matches!(err, IngressError::MissingHeader(HEADER_EVENT)));
    }

    #[test]
    fn missing_signature_header() {
        let body = b"{}";
        let mut headers = signed_headers("issues", body);
        headers.remove(HEADER_SIGNATURE);
        let err = WebhookEvent::from_http(&headers, body, SECRET).unwrap_err();
        assert!(matches!(err, IngressError::MissingHeader(HEADER_SIGNATURE)));
    }

    #[test]
    fn signature_checked_before_json() {
        let headers = signed_headers("issues", b"{}");
        let err = WebhookEvent::from_http(&headers, b"not json", SECRET).unwrap_err();
        assert!(matches!(
            err,
            IngressError::InvalidSignature(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn signed_garbage_is_invalid_json() {
        let body = b"not json";
        let err = WebhookEvent::from_http(&signed_headers("issues", body), body, SECRET).unwrap_err();
        assert!(matches!(err, IngressError::InvalidJson(_)));
    }

    #[test]
    fn installation_id_absent_or_null() {
        assert_eq!(WebhookEvent::new("ping", serde_json::json!({})).installation_id(), None);
        assert_eq!(
            WebhookEvent::new("ping", serde_json::json!({"installation": null})).installation_id(),
            None
        );
        assert_eq!(
            WebhookEvent::new("ping", serde_json::json!({"installation": {"id": "55"}}))
                .installation_id(),
            Some(InstallationId::from("55"))
        );
    }
}
