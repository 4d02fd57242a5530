//! Slack Events API envelope types.
//!
//! Slack wraps every delivery in an outer envelope whose `type` decides what
//! the rest of the payload means:
//!
//! - `url_verification` - handshake probe sent when the request URL is
//!   configured; carries a `challenge` to echo back and no event id
//! - `event_callback` - an actual event, with the outer `event_id` used for
//!   deduplication and the inner `event` object describing what happened
//!
//! Anything else (e.g. `app_rate_limited`) is surfaced as
//! [`SlackEnvelope::Other`] so it can be acknowledged without processing.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::EventId;

/// Subtype Slack attaches to messages posted by bots.
const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// A parsed Slack envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum SlackEnvelope {
    /// Handshake probe; answered by echoing the challenge.
    UrlVerification(UrlVerification),

    /// A delivered event.
    EventCallback(EventCallback),

    /// A well-formed envelope of a type the gate does not act on.
    Other { envelope_type: String },
}

impl SlackEnvelope {
    /// Returns the outer event id, if this envelope carries one.
    pub fn event_id(&self) -> Option<&EventId> {
        match self {
            SlackEnvelope::EventCallback(callback) => callback.event_id.as_ref(),
            SlackEnvelope::UrlVerification(_) | SlackEnvelope::Other { .. } => None,
        }
    }
}

/// The `url_verification` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlVerification {
    pub challenge: String,
}

/// An `event_callback` delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCallback {
    /// Outer event id. `None` when absent or empty.
    pub event_id: Option<EventId>,

    /// Workspace the event came from.
    pub team_id: Option<String>,

    /// Unix seconds at which Slack generated the event.
    pub event_time: Option<i64>,

    /// The inner event, if the payload carried one.
    pub event: Option<InnerEvent>,

    /// The full payload, untouched, for downstream processing.
    pub payload: serde_json::Value,
}

/// The inner `event` object of a callback.
///
/// Only the fields the gate and a typical mention handler need are lifted out;
/// everything else stays available in [`EventCallback::payload`].
///
/// Field shapes vary by event type (`team_join` carries `user` as an object,
/// `channel_created` does the same with `channel`), so a lifted field that is
/// not a string reads as `None` instead of failing the whole envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerEvent {
    #[serde(rename = "type", default, deserialize_with = "lenient_type")]
    pub event_type: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub user: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub channel: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub ts: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub thread_ts: Option<String>,

    /// Present when the message was posted by a bot (including this one).
    #[serde(default, deserialize_with = "lenient_string")]
    pub bot_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub subtype: Option<String>,
}

/// Reads any JSON value, keeping it only if it is a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(Option::unwrap_or_default)
}

impl InnerEvent {
    /// Returns `true` if this event was produced by a bot rather than a person.
    ///
    /// A bot reply that mentions the bot comes back as a fresh event; acting on
    /// it would loop. `bot_user_id` is the bot's own user id, when known.
    pub fn is_self_echo(&self, bot_user_id: Option<&str>) -> bool {
        if self.bot_id.as_deref().is_some_and(|id| !id.is_empty()) {
            return true;
        }
        if self.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE) {
            return true;
        }
        matches!(
            (bot_user_id, self.user.as_deref()),
            (Some(own), Some(user)) if own == user
        )
    }

    /// The thread a reply to this event belongs in: the existing thread, or a
    /// new thread rooted at this message.
    pub fn reply_thread_ts(&self) -> Option<&str> {
        self.thread_ts.as_deref().or(self.ts.as_deref())
    }
}
