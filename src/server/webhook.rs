//! Slack Events API endpoint handler.
//!
//! Runs each delivery through the admission pipeline and answers within the
//! request: Slack gives an endpoint about three seconds before it retries, so
//! processing of admitted events happens on a spawned task and never delays
//! the response.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::AppState;
use crate::admission::{AdmissionResult, EventProcessor, InboundDelivery, RejectReason, RetryInfo};

/// Header name for the request timestamp.
pub const HEADER_TIMESTAMP: &str = "x-slack-request-timestamp";
/// Header name for the request signature.
pub const HEADER_SIGNATURE: &str = "x-slack-signature";
/// Header name for the retry attempt number.
pub const HEADER_RETRY_NUM: &str = "x-slack-retry-num";
/// Header name for the retry reason.
pub const HEADER_RETRY_REASON: &str = "x-slack-retry-reason";

/// Errors surfaced to the caller.
///
/// Messages are fixed so a rejection never reveals which check failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// Signature, timestamp, or auth headers did not check out.
    #[error("invalid request signature")]
    InvalidSignature,

    /// Body is not a Slack envelope.
    #[error("malformed payload")]
    MalformedPayload,

    /// The event could not be handed off; Slack should redeliver it.
    #[error("service unavailable")]
    Unavailable,
}

impl From<RejectReason> for WebhookError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::AuthInvalid => WebhookError::InvalidSignature,
            RejectReason::MalformedPayload => WebhookError::MalformedPayload,
            RejectReason::Unavailable => WebhookError::Unavailable,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload => StatusCode::BAD_REQUEST,
            WebhookError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Body of the `url_verification` handshake response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// Slack events handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-Slack-Request-Timestamp`: Unix seconds when Slack sent the request
///   - `X-Slack-Signature`: `v0=<hex HMAC-SHA256>`
/// - Optional headers:
///   - `X-Slack-Retry-Num`, `X-Slack-Retry-Reason`: present on redeliveries
/// - Body: JSON envelope
///
/// # Response
///
/// - 200 OK with `{"challenge": ...}`: URL verification handshake
/// - 200 OK, empty: accepted, duplicate, self-originated, or ignored
/// - 400 Bad Request: body is not a Slack envelope
/// - 401 Unauthorized: missing or invalid signature, stale timestamp
/// - 503 Service Unavailable: event could not be handed off for processing
///
/// # Example
///
/// ```ignore
/// POST /slack/events HTTP/1.1
/// X-Slack-Request-Timestamp: 1700000000
/// X-Slack-Signature: v0=...
/// Content-Type: application/json
///
/// {"type": "event_callback", "event_id": "Ev08MFMKH6", "event": {...}}
///
/// HTTP/1.1 200 OK
/// ```
pub async fn slack_events_handler<P: EventProcessor>(
    State(app_state): State<AppState<P>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    // A missing auth header fails verification like a wrong one
    let timestamp = get_header(&headers, HEADER_TIMESTAMP).unwrap_or_default();
    let signature = get_header(&headers, HEADER_SIGNATURE).unwrap_or_default();
    let retry = get_header(&headers, HEADER_RETRY_NUM).map(|num| RetryInfo {
        num,
        reason: get_header(&headers, HEADER_RETRY_REASON),
    });

    debug!(
        body_len = body.len(),
        is_retry = retry.is_some(),
        "Received Slack delivery"
    );

    let delivery = InboundDelivery {
        body: &body,
        timestamp: &timestamp,
        signature: &signature,
        retry: retry.as_ref(),
    };

    match app_state.pipeline().handle_delivery(delivery) {
        AdmissionResult::Rejected(reason) => Err(reason.into()),
        AdmissionResult::UrlVerification { challenge } => {
            Ok(Json(ChallengeResponse { challenge }).into_response())
        }
        AdmissionResult::Ignored { .. }
        | AdmissionResult::DroppedDuplicate
        | AdmissionResult::AcceptedForProcessing(_) => Ok(StatusCode::OK.into_response()),
    }
}

/// Extracts a header value as a string, if present and valid UTF-8.
fn get_header(headers: &HeaderMap, name: &'static str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
