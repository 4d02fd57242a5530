//! In-memory deduplication of upstream event ids.
//!
//! Slack delivers events at least once: a request that is not acknowledged
//! within a few seconds is retried with the same `event_id`. The cache in this
//! module gives each id at most one admission within its TTL.
//!
//! The cache is process-local and not persisted. A restart forgets every id,
//! so a retry that straddles a restart is admitted again.

pub mod cache;

pub use cache::{
    CacheConfig, DEFAULT_CAPACITY, DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL, DedupeCache,
};
