//! Slack request signature verification using HMAC-SHA256.
//!
//! Slack signs every Events API request with the app's signing secret. The
//! signature covers the base string `v0:<timestamp>:<body>` and arrives in the
//! `X-Slack-Signature` header as `v0=<hex>`, with the timestamp itself in
//! `X-Slack-Request-Timestamp`.
//!
//! Verification is the first step in admission; requests that fail it are
//! rejected before the body is parsed. Every failure mode (stale timestamp,
//! unparseable timestamp, malformed header, mismatched MAC) collapses to
//! `false` so callers cannot leak which check failed.

use std::fmt;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Version prefix of the signing scheme, used in both the base string and the header.
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum distance, in seconds, between the request timestamp and the local clock.
pub const REPLAY_WINDOW_SECS: u64 = 300;

/// Parses a Slack signature header (e.g., "v0=abc123...") into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex, etc.).
/// Never panics.
///
/// # Examples
///
/// ```
/// use event_gate::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("v0=abcd1234").is_some());
///
/// // Missing version prefix
/// assert!(parse_signature_header("abcd1234").is_none());
///
/// // Unknown version
/// assert!(parse_signature_header("v1=abcd1234").is_none());
///
/// // Bad hex
/// assert!(parse_signature_header("v0=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("v0=")?;
    hex::decode(hex_sig).ok()
}

/// Builds a MAC already fed with the signing base string `v0:<timestamp>:<body>`.
///
/// The body is hashed exactly as received; it must not be re-serialized.
fn keyed_base_string(body: &[u8], timestamp: &str, secret: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

/// Computes the HMAC-SHA256 signature of a request body at the given timestamp.
///
/// Mostly useful for tests and tooling that need to produce valid requests.
pub fn compute_signature(body: &[u8], timestamp: &str, secret: &[u8]) -> Vec<u8> {
    keyed_base_string(body, timestamp, secret)
        .finalize()
        .into_bytes()
        .to_vec()
}

/// Formats a signature as a Slack-style header value: `v0=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}={}", SIGNATURE_VERSION, hex::encode(signature))
}

/// Returns `true` if `timestamp` lies within the replay window around `now`.
///
/// Both values are Unix seconds. Timestamps from the future are held to the
/// same bound as timestamps from the past.
pub fn is_fresh(timestamp: i64, now: i64) -> bool {
    now.abs_diff(timestamp) <= REPLAY_WINDOW_SECS
}

/// Verifies a Slack request signature against the current wall clock.
///
/// Returns `true` only if the timestamp is an integer within
/// [`REPLAY_WINDOW_SECS`] of now and the signature matches. Uses
/// constant-time comparison.
///
/// # Arguments
///
/// * `body` - The raw request body bytes
/// * `timestamp` - The value of the `X-Slack-Request-Timestamp` header
/// * `signature_header` - The value of the `X-Slack-Signature` header (e.g., "v0=...")
/// * `secret` - The app's signing secret
///
/// # Examples
///
/// ```
/// use event_gate::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let body = br#"{"type":"event_callback"}"#;
/// let secret = b"signing-secret";
/// let timestamp = chrono::Utc::now().timestamp().to_string();
///
/// let header = format_signature_header(&compute_signature(body, &timestamp, secret));
///
/// assert!(verify_signature(body, &timestamp, &header, secret));
/// assert!(!verify_signature(body, &timestamp, &header, b"wrong-secret"));
/// ```
pub fn verify_signature(
    body: &[u8],
    timestamp: &str,
    signature_header: &str,
    secret: &[u8],
) -> bool {
    verify_signature_at(
        body,
        timestamp,
        signature_header,
        secret,
        Utc::now().timestamp(),
    )
}

/// Verifies a Slack request signature against an explicit clock reading.
///
/// `now` is in Unix seconds. The freshness check runs before any hashing so
/// stale replays are rejected cheaply; the MAC is still required to match for
/// fresh requests.
pub fn verify_signature_at(
    body: &[u8],
    timestamp: &str,
    signature_header: &str,
    secret: &[u8],
    now: i64,
) -> bool {
    let Ok(request_time) = timestamp.parse::<i64>() else {
        return false;
    };

    if !is_fresh(request_time, now) {
        return false;
    }

    let Some(provided) = parse_signature_header(signature_header) else {
        return false;
    };

    // Constant-time comparison via the HMAC library
    keyed_base_string(body, timestamp, secret)
        .verify_slice(&provided)
        .is_ok()
}

/// A verifier bound to one signing secret.
///
/// The secret is supplied once at start-up and never printed.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        SignatureVerifier {
            secret: secret.into(),
        }
    }

    /// Verifies a request against the current wall clock.
    pub fn verify(&self, body: &[u8], timestamp: &str, signature_header: &str) -> bool {
        verify_signature(body, timestamp, signature_header, &self.secret)
    }

    /// Verifies a request against an explicit clock reading (Unix seconds).
    pub fn verify_at(
        &self,
        body: &[u8],
        timestamp: &str,
        signature_header: &str,
        now: i64,
    ) -> bool {
        verify_signature_at(body, timestamp, signature_header, &self.secret, now)
    }

    /// Produces the `X-Slack-Signature` header value for a body and timestamp.
    pub fn sign(&self, body: &[u8], timestamp: &str) -> String {
        format_signature_header(&compute_signature(body, timestamp, &self.secret))
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
