//! Slack envelope parser.
//!
//! Turns a verified request body into a typed [`SlackEnvelope`]. The parser is
//! lenient about unknown fields and unknown envelope types, and strict about
//! the body being a JSON object with a string `type`.
//!
//! Signature verification happens before this runs; the parser never sees an
//! unauthenticated body.

use serde::Deserialize;
use thiserror::Error;

use crate::types::EventId;

use super::events::{EventCallback, InnerEvent, SlackEnvelope, UrlVerification};

/// Error type for envelope parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Body is not valid JSON, or a field has the wrong JSON type.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Body is valid JSON but not an object.
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// A field the envelope type requires is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    envelope_type: Option<String>,
    challenge: Option<String>,
    event_id: Option<String>,
    team_id: Option<String>,
    event_time: Option<i64>,
    event: Option<InnerEvent>,
}

/// Parses a raw request body into a Slack envelope.
///
/// # Returns
///
/// * `Ok(SlackEnvelope::UrlVerification(_))` - handshake probe
/// * `Ok(SlackEnvelope::EventCallback(_))` - an event delivery
/// * `Ok(SlackEnvelope::Other { .. })` - a known-shape envelope the gate ignores
/// * `Err(e)` - not JSON, not an object, no `type`, or a typed field is malformed
///
/// # Examples
///
/// ```
/// use event_gate::webhooks::{SlackEnvelope, parse_envelope};
///
/// let body = br#"{
///     "type": "event_callback",
///     "event_id": "Ev08MFMKH6",
///     "event": { "type": "app_mention", "user": "U1", "text": "<@U0> hi", "channel": "C1" }
/// }"#;
///
/// let envelope = parse_envelope(body).unwrap();
/// assert_eq!(envelope.event_id().map(|id| id.as_str()), Some("Ev08MFMKH6"));
/// assert!(matches!(envelope, SlackEnvelope::EventCallback(_)));
/// ```
pub fn parse_envelope(payload: &[u8]) -> Result<SlackEnvelope, ParseError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }

    let raw = RawEnvelope::deserialize(&value)?;
    let envelope_type = raw.envelope_type.ok_or(ParseError::MissingField("type"))?;

    match envelope_type.as_str() {
        "url_verification" => {
            let challenge = raw.challenge.ok_or(ParseError::MissingField("challenge"))?;
            Ok(SlackEnvelope::UrlVerification(UrlVerification { challenge }))
        }
        "event_callback" => Ok(SlackEnvelope::EventCallback(EventCallback {
            // An empty id identifies nothing; treat it like a missing one
            event_id: raw.event_id.filter(|id| !id.is_empty()).map(EventId::from),
            team_id: raw.team_id,
            event_time: raw.event_time,
            event: raw.event,
            payload: value,
        })),
        _ => Ok(SlackEnvelope::Other { envelope_type }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<SlackEnvelope, ParseError> {
        parse_envelope(&serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn parses_url_verification() {
        let envelope = parse(json!({
            "token": "legacy",
            "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P",
            "type": "url_verification"
        }))
        .unwrap();

        assert_eq!(
            envelope,
            SlackEnvelope::UrlVerification(UrlVerification {
                challenge: "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P".to_string()
            })
        );
    }

    #[test]
    fn url_verification_without_challenge_is_malformed() {
        let result = parse(json!({ "type": "url_verification" }));
        assert!(matches!(result, Err(ParseError::MissingField("challenge"))));
    }

    #[test]
    fn parses_app_mention_callback() {
        let body = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev1",
            "event_time": 1700000000,
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> what's the refund policy?",
                "channel": "C1",
                "ts": "1700000000.000100",
                "unknown_field": { "nested": true }
            }
        });

        let SlackEnvelope::EventCallback(callback) = parse(body.clone()).unwrap() else {
            panic!("expected event_callback");
        };

        assert_eq!(callback.event_id, Some(EventId::new("Ev1")));
        assert_eq!(callback.team_id.as_deref(), Some("T1"));
        assert_eq!(callback.event_time, Some(1_700_000_000));
        assert_eq!(callback.payload, body);

        let event = callback.event.unwrap();
        assert_eq!(event.event_type, "app_mention");
        assert_eq!(event.user.as_deref(), Some("U1"));
        assert_eq!(event.channel.as_deref(), Some("C1"));
        assert_eq!(event.bot_id, None);
    }

    #[test]
    fn missing_event_id_parses_as_none() {
        let SlackEnvelope::EventCallback(callback) = parse(json!({
            "type": "event_callback",
            "event": { "type": "app_mention" }
        }))
        .unwrap() else {
            panic!("expected event_callback");
        };
        assert_eq!(callback.event_id, None);
    }

    #[test]
    fn empty_event_id_parses_as_none() {
        let envelope = parse(json!({
            "type": "event_callback",
            "event_id": "",
            "event": { "type": "app_mention" }
        }))
        .unwrap();
        assert_eq!(envelope.event_id(), None);
    }

    fn callback(body: serde_json::Value) -> EventCallback {
        match parse(body).unwrap() {
            SlackEnvelope::EventCallback(callback) => callback,
            other => panic!("expected event_callback, got {:?}", other),
        }
    }

    #[test]
    fn parses_team_join_with_user_object() {
        let callback = callback(json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev-tj",
            "event": {
                "type": "team_join",
                "user": {
                    "id": "U9",
                    "team_id": "T1",
                    "name": "newhire",
                    "deleted": false,
                    "profile": { "real_name": "New Hire" },
                    "is_bot": false
                },
                "event_ts": "1700000000.000300"
            }
        }));

        assert_eq!(callback.event_id, Some(EventId::new("Ev-tj")));
        let event = callback.event.unwrap();
        assert_eq!(event.event_type, "team_join");
        assert_eq!(event.user, None);
        assert_eq!(callback.payload["event"]["user"]["id"], "U9");
    }

    #[test]
    fn parses_channel_created_with_channel_object() {
        let callback = callback(json!({
            "type": "event_callback",
            "event_id": "Ev-cc",
            "event": {
                "type": "channel_created",
                "channel": {
                    "id": "C9",
                    "name": "fun",
                    "created": 1700000000,
                    "creator": "U1"
                }
            }
        }));

        let event = callback.event.unwrap();
        assert_eq!(event.event_type, "channel_created");
        assert_eq!(event.channel, None);
    }

    #[test]
    fn parses_reaction_added_with_item_object() {
        let callback = callback(json!({
            "type": "event_callback",
            "event_id": "Ev-ra",
            "event": {
                "type": "reaction_added",
                "user": "U1",
                "reaction": "thumbsup",
                "item_user": "U2",
                "item": { "type": "message", "channel": "C1", "ts": "1700000000.000100" },
                "event_ts": "1700000001.000100"
            }
        }));

        let event = callback.event.unwrap();
        assert_eq!(event.event_type, "reaction_added");
        assert_eq!(event.user.as_deref(), Some("U1"));
        assert_eq!(event.channel, None);
    }

    #[test]
    fn unknown_envelope_type_is_other() {
        let envelope = parse(json!({ "type": "app_rate_limited", "minute_rate_limited": 1 })).unwrap();
        assert_eq!(
            envelope,
            SlackEnvelope::Other {
                envelope_type: "app_rate_limited".to_string()
            }
        );
    }

    #[test]
    fn invalid_json_is_error() {
        assert!(matches!(
            parse_envelope(b"{not json"),
            Err(ParseError::JsonError(_))
        ));
        assert!(matches!(parse_envelope(b""), Err(ParseError::JsonError(_))));
    }

    #[test]
    fn non_object_is_error() {
        assert!(matches!(parse_envelope(b"[]"), Err(ParseError::NotAnObject)));
        assert!(matches!(
            parse_envelope(b"\"event_callback\""),
            Err(ParseError::NotAnObject)
        ));
    }

    #[test]
    fn missing_type_is_error() {
        let result = parse(json!({ "event_id": "Ev1" }));
        assert!(matches!(result, Err(ParseError::MissingField("type"))));
    }

    #[test]
    fn wrongly_typed_field_is_error() {
        let result = parse(json!({ "type": "event_callback", "event_id": 42 }));
        assert!(matches!(result, Err(ParseError::JsonError(_))));

        let result = parse(json!({ "type": "event_callback", "event": "not an object" }));
        assert!(matches!(result, Err(ParseError::JsonError(_))));
    }
}
