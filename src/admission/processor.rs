//! Downstream handoff for admitted events.
//!
//! The pipeline never waits for processing: Slack expects an acknowledgement
//! within a few seconds, and answering a mention (fetching thread history,
//! calling a model, posting a reply) takes much longer. Admitted events are
//! handed to an [`EventProcessor`] on a spawned task and the pipeline returns
//! immediately.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::types::EventId;
use crate::webhooks::InnerEvent;

/// An event that passed verification and deduplication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmittedEvent {
    /// Outer event id. `None` when the delivery carried no id and was admitted
    /// without deduplication.
    pub event_id: Option<EventId>,

    pub team_id: Option<String>,

    /// The inner event.
    pub event: InnerEvent,

    /// The full envelope as received.
    pub payload: serde_json::Value,

    /// When the gate admitted the event.
    pub admitted_at: DateTime<Utc>,
}

/// Receives admitted events.
///
/// Implementations run on a spawned task; failures are theirs to log or
/// retry and never affect the acknowledgement already sent to Slack.
pub trait EventProcessor: Send + Sync + 'static {
    fn process_event(&self, event: AdmittedEvent) -> impl Future<Output = ()> + Send;
}

/// A processor that only logs what it receives.
///
/// This is what the binary runs with when no agent is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProcessor;

impl EventProcessor for LoggingProcessor {
    async fn process_event(&self, event: AdmittedEvent) {
        let preview: String = event
            .event
            .text
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(100)
            .collect();

        info!(
            event_id = ?event.event_id.as_ref().map(EventId::as_str),
            event_type = %event.event.event_type,
            channel = ?event.event.channel,
            user = ?event.event.user,
            thread_ts = ?event.event.reply_thread_ts(),
            message_preview = %preview,
            "Processing admitted event"
        );
    }
}
