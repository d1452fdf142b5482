//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Decoding of verified deliveries into [`WebhookEvent`]s
//! - The [`EventRouter`] that fans events out to registered handlers
//! - Helpers for reading payload fields and finding where to reply

pub mod event;
pub mod payload;
pub mod reply;
pub mod router;
pub mod signature;

pub use event::{IngressError, WebhookEvent};
pub use payload::{lookup, lookup_str};
pub use reply::{reaction_url, reply_url};
pub use router::{
    DispatchError, DispatchOutcome, EventHandler, EventRouter, FnHandler, Restrictions, Route,
    RouterError, handler_fn,
};
pub use signature::{
    SignatureError, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
