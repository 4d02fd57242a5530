//! Shared test fixtures: signed request builders and a recording processor.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::admission::{AdmittedEvent, EventProcessor};
use crate::webhooks::{compute_signature, format_signature_header};

pub const TEST_SECRET: &[u8] = b"test-signing-secret";

/// A fixed "current time" for tests that pin the clock (Unix seconds).
pub const TEST_NOW: i64 = 1_700_000_000;

/// Signs `body` with [`TEST_SECRET`] at `timestamp`.
pub fn sign_at(body: &[u8], timestamp: i64) -> String {
    format_signature_header(&compute_signature(
        body,
        &timestamp.to_string(),
        TEST_SECRET,
    ))
}

/// An `app_mention` callback from user `U1` in channel `C1`.
pub fn mention_body(event_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "token": "legacy-token",
        "team_id": "T1",
        "api_app_id": "A1",
        "type": "event_callback",
        "event_id": event_id,
        "event_time": TEST_NOW,
        "event": {
            "type": "app_mention",
            "user": "U1",
            "text": "<@UBOT> how do I reset my password?",
            "ts": "1700000000.000100",
            "channel": "C1",
            "event_ts": "1700000000.000100"
        }
    }))
    .unwrap()
}

/// Records every event it is given and wakes waiters.
#[derive(Clone, Default)]
pub struct RecordingProcessor {
    events: Arc<Mutex<Vec<AdmittedEvent>>>,
    notify: Arc<Notify>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Waits (up to a few seconds) until at least `n` events were processed.
    pub async fn wait_for(&self, n: usize) -> Vec<AdmittedEvent> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                {
                    let events = self.events.lock();
                    if events.len() >= n {
                        return events.clone();
                    }
                }
                notified.await;
            }
        };

        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {} processed events", n))
    }
}

impl EventProcessor for RecordingProcessor {
    async fn process_event(&self, event: AdmittedEvent) {
        self.events.lock().push(event);
        self.notify.notify_waiters();
    }
}
