//! Webhook signature verification (HMAC-SHA256).
//!
//! GitHub signs every delivery with the webhook secret and sends the result in
//! the `X-Hub-Signature-256` header as `sha256=<hex>`. A delivery whose
//! signature does not verify never reaches the router.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a delivery's signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header is not `sha256=<even-length hex>`.
    #[error("malformed signature header")]
    Malformed,

    /// The header parsed but does not match the body.
    #[error("signature does not match payload")]
    Mismatch,
}

/// Parses a signature header (e.g. `sha256=abc123...`) into raw bytes.
///
/// Returns `None` for malformed headers. Never panics.
///
/// ```
/// use snekomatic::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=1234abcd"), Some(vec![0x12, 0x34, 0xab, 0xcd]));
/// assert!(parse_signature_header("sha1=1234abcd").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.trim().strip_prefix("sha256=")?).ok()
}

/// Computes the HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a header value, `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a delivery's signature header against its raw body.
///
/// The comparison is constant-time.
///
/// ```
/// use snekomatic::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let body = br#"{"zen": "Design for failure."}"#;
/// let header = format_signature_header(&compute_signature(body, b"s3cret"));
///
/// assert!(verify_signature(body, &header, b"s3cret").is_ok());
/// assert!(verify_signature(body, &header, b"other").is_err());
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let expected = parse_signature_header(signature_header).ok_or(SignatureError::Malformed)?;
    if expected.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
