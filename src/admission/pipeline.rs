//! The admission pipeline: verify, parse, deduplicate, hand off.
//!
//! [`AdmissionPipeline::handle_delivery`] decides what happens to one inbound
//! Slack request and returns without waiting for any downstream work:
//!
//! 1. Verify the timestamped signature; failure → `Rejected(AuthInvalid)`
//! 2. Parse the envelope; failure → `Rejected(MalformedPayload)`
//! 3. `url_verification` → echo the challenge (no cache interaction)
//! 4. Unhandled envelope or inner event type → `Ignored`
//! 5. Bot-originated event → `DroppedDuplicate` (no cache interaction)
//! 6. No runtime to hand off to → `Rejected(Unavailable)`, nothing marked
//! 7. No `event_id` → admit without deduplication
//! 8. `check_and_mark(event_id)` → duplicate, or admit and spawn processing
//!
//! Every path returns an [`AdmissionResult`]; nothing escapes as an error.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use super::processor::{AdmittedEvent, EventProcessor};
use super::stats::{AdmissionStats, Counter, StatsSnapshot};
use crate::dedupe::DedupeCache;
use crate::types::EventId;
use crate::webhooks::{EventCallback, SignatureVerifier, SlackEnvelope, parse_envelope};

/// Inner event type the bot acts on by default.
pub const DEFAULT_HANDLED_EVENT_TYPE: &str = "app_mention";

/// Why a delivery was rejected.
///
/// Deliberately coarse: an authentication failure never says which check
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AuthInvalid,
    MalformedPayload,

    /// No async runtime to process the event on. Nothing was marked, so a
    /// redelivery can still be admitted.
    Unavailable,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AuthInvalid => write!(f, "invalid request signature"),
            RejectReason::MalformedPayload => write!(f, "malformed payload"),
            RejectReason::Unavailable => write!(f, "service unavailable"),
        }
    }
}

/// Outcome of one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionResult {
    /// Failed authentication or parsing.
    Rejected(RejectReason),

    /// Handshake probe; the transport must echo `challenge`.
    UrlVerification { challenge: String },

    /// Authentic and well-formed, but not something this bot handles.
    Ignored { event_type: String },

    /// Already admitted (or self-originated); nothing further happens.
    DroppedDuplicate,

    /// Admitted; processing has been spawned.
    AcceptedForProcessing(AdmittedEvent),
}

/// Slack's retry metadata (`X-Slack-Retry-Num`, `X-Slack-Retry-Reason`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryInfo {
    pub num: String,
    pub reason: Option<String>,
}

/// One inbound request as the transport received it.
#[derive(Debug, Clone, Copy)]
pub struct InboundDelivery<'a> {
    /// Raw body, exactly as received.
    pub body: &'a [u8],

    /// `X-Slack-Request-Timestamp`.
    pub timestamp: &'a str,

    /// `X-Slack-Signature`.
    pub signature: &'a str,

    pub retry: Option<&'a RetryInfo>,
}

/// Policy knobs for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Inner event types that are deduplicated and processed.
    pub handled_event_types: HashSet<String>,

    /// The bot's own user id; events authored by it are dropped as self-echo.
    pub bot_user_id: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            handled_event_types: HashSet::from([DEFAULT_HANDLED_EVENT_TYPE.to_string()]),
            bot_user_id: None,
        }
    }
}

/// Composes signature verification, envelope parsing and deduplication.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct AdmissionPipeline<P> {
    verifier: SignatureVerifier,
    cache: Arc<DedupeCache>,
    processor: Arc<P>,
    config: PipelineConfig,
    stats: AdmissionStats,
    runtime: Option<Handle>,
}

impl<P: EventProcessor> AdmissionPipeline<P> {
    /// Builds a pipeline that dispatches onto the runtime it is created in.
    ///
    /// Created outside a runtime, it falls back to whichever runtime is
    /// current when an event is admitted; see [`Self::with_runtime`].
    pub fn new(
        verifier: SignatureVerifier,
        cache: Arc<DedupeCache>,
        processor: P,
        config: PipelineConfig,
    ) -> Self {
        AdmissionPipeline {
            verifier,
            cache,
            processor: Arc::new(processor),
            config,
            stats: AdmissionStats::default(),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Dispatches admitted events onto `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Handles one delivery against the current wall clock.
    ///
    /// Admitted events are spawned onto the ambient Tokio runtime.
    pub fn handle_delivery(&self, delivery: InboundDelivery<'_>) -> AdmissionResult {
        self.handle_delivery_at(delivery, Utc::now().timestamp())
    }

    /// Handles one delivery, checking signature freshness against `now` (Unix seconds).
    pub fn handle_delivery_at(&self, delivery: InboundDelivery<'_>, now: i64) -> AdmissionResult {
        if !self
            .verifier
            .verify_at(delivery.body, delivery.timestamp, delivery.signature, now)
        {
            warn!("Rejected delivery with invalid signature");
            self.stats.incr(Counter::RejectedAuth);
            return AdmissionResult::Rejected(RejectReason::AuthInvalid);
        }

        let envelope = match parse_envelope(delivery.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Rejected malformed payload");
                self.stats.incr(Counter::RejectedMalformed);
                return AdmissionResult::Rejected(RejectReason::MalformedPayload);
            }
        };

        if let Some(retry) = delivery.retry {
            warn!(
                retry_num = %retry.num,
                retry_reason = ?retry.reason,
                event_id = ?envelope.event_id().map(EventId::as_str),
                "Slack retry detected"
            );
            self.stats.incr(Counter::RetrySeen);
        }

        let callback = match envelope {
            SlackEnvelope::UrlVerification(probe) => {
                info!("Answering URL verification challenge");
                self.stats.incr(Counter::UrlVerification);
                return AdmissionResult::UrlVerification {
                    challenge: probe.challenge,
                };
            }
            SlackEnvelope::Other { envelope_type } => {
                debug!(envelope_type = %envelope_type, "Ignoring envelope type");
                self.stats.incr(Counter::Ignored);
                return AdmissionResult::Ignored {
                    event_type: envelope_type,
                };
            }
            SlackEnvelope::EventCallback(callback) => callback,
        };

        self.admit_callback(callback, delivery.retry.is_some())
    }

    fn admit_callback(&self, callback: EventCallback, is_retry: bool) -> AdmissionResult {
        let EventCallback {
            event_id,
            team_id,
            event,
            payload,
            ..
        } = callback;

        let Some(event) = event.filter(|e| self.config.handled_event_types.contains(&e.event_type))
        else {
            let event_type = payload
                .get("event")
                .and_then(|e| e.get("type"))
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            debug!(event_type = %event_type, "Ignoring unhandled event type");
            self.stats.incr(Counter::Ignored);
            return AdmissionResult::Ignored { event_type };
        };

        if event.is_self_echo(self.config.bot_user_id.as_deref()) {
            debug!(
                event_id = ?event_id.as_ref().map(EventId::as_str),
                bot_id = ?event.bot_id,
                "Dropping self-originated event"
            );
            self.stats.incr(Counter::SelfEchoDropped);
            return AdmissionResult::DroppedDuplicate;
        }

        // Resolve the handoff before marking: an id marked but never
        // dispatched would turn every redelivery into a duplicate
        let Some(runtime) = self.dispatch_runtime() else {
            error!(
                event_id = ?event_id.as_ref().map(EventId::as_str),
                "No async runtime available; refusing event so it can be redelivered"
            );
            self.stats.incr(Counter::RejectedUnavailable);
            return AdmissionResult::Rejected(RejectReason::Unavailable);
        };

        match &event_id {
            None => {
                warn!(
                    event_type = %event.event_type,
                    channel = ?event.channel,
                    "Event has no event_id; admitting without deduplication"
                );
                self.stats.incr(Counter::AcceptedWithoutId);
            }
            Some(id) => {
                if self.cache.check_and_mark(id.as_str()) {
                    info!(
                        event_id = %id,
                        channel = ?event.channel,
                        is_retry,
                        "Duplicate event ignored"
                    );
                    self.stats.incr(Counter::DuplicateDropped);
                    return AdmissionResult::DroppedDuplicate;
                }
            }
        }

        info!(
            event_id = ?event_id.as_ref().map(EventId::as_str),
            event_type = %event.event_type,
            channel = ?event.channel,
            "Event accepted"
        );
        self.stats.incr(Counter::Accepted);

        let admitted = AdmittedEvent {
            event_id,
            team_id,
            event,
            payload,
            admitted_at: Utc::now(),
        };
        self.dispatch(&runtime, admitted.clone());

        AdmissionResult::AcceptedForProcessing(admitted)
    }

    fn dispatch_runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    /// Spawns processing of an admitted event without awaiting it.
    fn dispatch(&self, runtime: &Handle, event: AdmittedEvent) {
        let processor = Arc::clone(&self.processor);
        runtime.spawn(async move {
            processor.process_event(event).await;
        });
    }

    /// Current counters plus cache occupancy.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.cache.len(), self.cache.capacity())
    }

    pub fn cache(&self) -> &Arc<DedupeCache> {
        &self.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl<P> fmt::Debug for AdmissionPipeline<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPipeline")
            .field("verifier", &self.verifier)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
