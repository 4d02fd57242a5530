//! Outcome counters for the admission pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Running totals, one per pipeline outcome.
///
/// Counters are independent relaxed atomics; a snapshot taken under load may
/// mix values from slightly different instants.
#[derive(Debug, Default)]
pub struct AdmissionStats {
    accepted: AtomicU64,
    accepted_without_id: AtomicU64,
    duplicates_dropped: AtomicU64,
    self_echoes_dropped: AtomicU64,
    ignored: AtomicU64,
    url_verifications: AtomicU64,
    rejected_auth: AtomicU64,
    rejected_malformed: AtomicU64,
    rejected_unavailable: AtomicU64,
    retries_seen: AtomicU64,
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    Accepted,
    AcceptedWithoutId,
    DuplicateDropped,
    SelfEchoDropped,
    Ignored,
    UrlVerification,
    RejectedAuth,
    RejectedMalformed,
    RejectedUnavailable,
    RetrySeen,
}

impl AdmissionStats {
    pub(crate) fn incr(&self, counter: Counter) {
        let cell = match counter {
            Counter::Accepted => &self.accepted,
            Counter::AcceptedWithoutId => &self.accepted_without_id,
            Counter::DuplicateDropped => &self.duplicates_dropped,
            Counter::SelfEchoDropped => &self.self_echoes_dropped,
            Counter::Ignored => &self.ignored,
            Counter::UrlVerification => &self.url_verifications,
            Counter::RejectedAuth => &self.rejected_auth,
            Counter::RejectedMalformed => &self.rejected_malformed,
            Counter::RejectedUnavailable => &self.rejected_unavailable,
            Counter::RetrySeen => &self.retries_seen,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter, pairing them with the cache's current size.
    pub fn snapshot(&self, cache_size: usize, cache_capacity: usize) -> StatsSnapshot {
        let load = |cell: &AtomicU64| cell.load(Ordering::Relaxed);
        StatsSnapshot {
            accepted: load(&self.accepted),
            accepted_without_id: load(&self.accepted_without_id),
            duplicates_dropped: load(&self.duplicates_dropped),
            self_echoes_dropped: load(&self.self_echoes_dropped),
            ignored: load(&self.ignored),
            url_verifications: load(&self.url_verifications),
            rejected_auth: load(&self.rejected_auth),
            rejected_malformed: load(&self.rejected_malformed),
            rejected_unavailable: load(&self.rejected_unavailable),
            retries_seen: load(&self.retries_seen),
            cache_size,
            cache_capacity,
        }
    }
}

/// Point-in-time copy of [`AdmissionStats`], served by the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Admissions, including those without an event id.
    pub accepted: u64,
    pub accepted_without_id: u64,
    pub duplicates_dropped: u64,
    pub self_echoes_dropped: u64,
    pub ignored: u64,
    pub url_verifications: u64,
    pub rejected_auth: u64,
    pub rejected_malformed: u64,
    pub rejected_unavailable: u64,
    /// Deliveries that carried Slack retry headers, whatever their outcome.
    pub retries_seen: u64,
    pub cache_size: usize,
    pub cache_capacity: usize,
}
