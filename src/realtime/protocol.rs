//! Phoenix-style channel protocol envelopes
//!
//! Every frame on the realtime socket is a JSON envelope of
//! `{topic, event, payload, ref}`. Channels are joined with `phx_join`,
//! acknowledged with `phx_reply`, and left with `phx_leave`; presence state
//! rides on `presence` pushes and `presence_state`/`presence_diff`
//! notifications; broadcasts ride on `broadcast` pushes.

use crate::realtime::PresencePayload;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT_EVENT: &str = "heartbeat";
pub const HEARTBEAT_TOPIC: &str = "phoenix";
pub const BROADCAST_EVENT: &str = "broadcast";
pub const PRESENCE_EVENT: &str = "presence";
pub const PRESENCE_STATE_EVENT: &str = "presence_state";
pub const PRESENCE_DIFF_EVENT: &str = "presence_diff";

/// One wire frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Envelope {
    /// Join a channel. The presence key identifies this member; own
    /// broadcasts are excluded server-side via `self: false`.
    pub fn join(topic: &str, presence_key: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: PHX_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": presence_key },
                    "postgres_changes": [],
                },
            }),
            reference: None,
        }
    }

    pub fn leave(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: PHX_LEAVE.to_string(),
            payload: json!({}),
            reference: None,
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: HEARTBEAT_EVENT.to_string(),
            payload: json!({}),
            reference: None,
        }
    }

    /// Announce presence state on a joined channel
    pub fn track(topic: &str, state: &PresencePayload) -> crate::errors::Result<Self> {
        Ok(Self {
            topic: topic.to_string(),
            event: PRESENCE_EVENT.to_string(),
            payload: json!({
                "type": "presence",
                "event": "track",
                "payload": serde_json::to_value(state)?,
            }),
            reference: None,
        })
    }

    /// Push a broadcast message on a joined channel
    pub fn broadcast(topic: &str, event: &str, payload: Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: BROADCAST_EVENT.to_string(),
            payload: json!({
                "type": "broadcast",
                "event": event,
                "payload": payload,
            }),
            reference: None,
        }
    }

    /// Whether a `phx_reply` payload reports success
    pub fn reply_is_ok(payload: &Value) -> bool {
        payload.get("status").and_then(Value::as_str) == Some("ok")
    }
}

/// Split an inbound `broadcast` frame payload into event name and body
pub fn parse_broadcast_payload(payload: &Value) -> Option<(String, Value)> {
    let event = payload.get("event")?.as_str()?.to_string();
    let body = payload.get("payload").cloned().unwrap_or(Value::Null);
    Some((event, body))
}

/// Which presence notifications a `presence_diff` payload carries
pub fn parse_presence_diff(payload: &Value) -> (bool, bool) {
    let non_empty = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_object)
            .is_some_and(|m| !m.is_empty())
    };
    (non_empty("joins"), non_empty("leaves"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ref_field_is_renamed_on_the_wire() {
        let mut envelope = Envelope::heartbeat();
        envelope.reference = Some("7".to_string());
        let json = serde_json::to_value(&envelope).expect("serializes");
        assert_eq!(json["ref"], "7");
        assert!(json.get("reference").is_none());

        let parsed: Envelope = serde_json::from_value(json).expect("parses");
        assert_eq!(parsed.reference.as_deref(), Some("7"));
    }

    #[test]
    fn join_payload_excludes_own_broadcasts() {
        let envelope = Envelope::join("realtime:event-42", "user_1");
        assert_eq!(envelope.event, PHX_JOIN);
        assert_eq!(envelope.payload["config"]["broadcast"]["self"], false);
        assert_eq!(envelope.payload["config"]["presence"]["key"], "user_1");
    }

    #[test]
    fn reply_status_parsing() {
        assert!(Envelope::reply_is_ok(&json!({"status": "ok", "response": {}})));
        assert!(!Envelope::reply_is_ok(&json!({"status": "error"})));
        assert!(!Envelope::reply_is_ok(&json!({})));
    }

    #[test]
    fn broadcast_payload_round_trip() {
        let envelope = Envelope::broadcast("realtime:event-42", "user_action", json!({"a": 1}));
        let (event, body) =
            parse_broadcast_payload(&envelope.payload).expect("well-formed payload");
        assert_eq!(event, "user_action");
        assert_eq!(body["a"], 1);
    }

    #[test]
    fn presence_diff_flags() {
        let diff = json!({"joins": {"user_2": {}}, "leaves": {}});
        assert_eq!(parse_presence_diff(&diff), (true, false));
        let diff = json!({"joins": {}, "leaves": {"user_3": {}}});
        assert_eq!(parse_presence_diff(&diff), (false, true));
    }
}
