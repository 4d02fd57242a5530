//! Slack Events API request handling.
//!
//! This module provides:
//! - Signature verification for request bodies (timestamped HMAC-SHA256)
//! - Envelope parsing into typed events

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{EventCallback, InnerEvent, SlackEnvelope, UrlVerification};
pub use parser::{ParseError, parse_envelope};
pub use signature::{
    REPLAY_WINDOW_SECS, SignatureVerifier, compute_signature, format_signature_header,
    parse_signature_header, verify_signature, verify_signature_at,
};
