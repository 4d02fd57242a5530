//! Event Gate - the front door of a Slack bot.
//!
//! Verifies Slack's request signatures, collapses retried deliveries of the
//! same event into a single admission, and hands admitted events to a
//! processor without holding up the acknowledgement Slack waits for.

pub mod admission;
pub mod config;
pub mod dedupe;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
