//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., passing a
//! delivery ID where an installation ID is expected) and make signatures
//! self-documenting.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A GitHub App installation identifier.
///
/// GitHub sends installation IDs as integers, but the bot treats them as
/// opaque: anything that renders to a stable string is accepted, so payloads
/// that carry the ID as a string work too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(String);

impl InstallationId {
    pub fn new(id: impl Into<String>) -> Self {
        InstallationId(id.into())
    }

    /// Builds an ID from a JSON value found in a webhook payload.
    ///
    /// Returns `None` for anything other than a number or a non-empty string
    /// (in particular for `null`, which GitHub uses for "no installation").
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(InstallationId(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(InstallationId(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InstallationId {
    fn from(n: u64) -> Self {
        InstallationId(n.to_string())
    }
}

impl From<&str> for InstallationId {
    fn from(s: &str) -> Self {
        InstallationId(s.to_string())
    }
}

/// A GitHub webhook delivery ID (the `X-GitHub-Delivery` header).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn new(s: impl Into<String>) -> Self {
        DeliveryId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeliveryId {
    fn from(s: String) -> Self {
        DeliveryId(s)
    }
}
