//! Packets exchanged with backend services over the RPC transport.
//!
//! Requests carry a correlation `id`; events omit it and expect no reply.
//! A backend may answer a request with several replies; only the one with
//! `isDisposed: true` (or an `err`) ends the exchange.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Outbound packet: a request (with `id`) or an event (without).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub pattern: String,
    #[serde(default)]
    pub data: Value,
}

impl RequestPacket {
    /// Builds a request packet that expects a reply correlated by `id`.
    #[must_use]
    pub fn request(id: impl Into<String>, pattern: impl Into<String>, data: Value) -> Self {
        Self {
            id: Some(id.into()),
            pattern: pattern.into(),
            data,
        }
    }

    /// Builds a fire-and-forget event packet.
    #[must_use]
    pub fn event(pattern: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            pattern: pattern.into(),
            data,
        }
    }

    /// Returns `true` when the packet expects no reply.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.id.is_none()
    }
}

/// Inbound reply to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPacket {
    #[serde(default)]
    pub id: Option<String>,
    /// `Some(Value::Null)` when the backend answered `null`, `None` when the
    /// field was absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,
    #[serde(rename = "isDisposed", default)]
    pub is_disposed: bool,
}

impl ReplyPacket {
    /// Final successful reply.
    #[must_use]
    pub fn disposed(id: impl Into<String>, response: Value) -> Self {
        Self {
            id: Some(id.into()),
            response: Some(response),
            err: None,
            is_disposed: true,
        }
    }

    /// Intermediate reply of a streaming response.
    #[must_use]
    pub fn partial(id: impl Into<String>, response: Value) -> Self {
        Self {
            id: Some(id.into()),
            response: Some(response),
            err: None,
            is_disposed: false,
        }
    }

    /// Error reply; always ends the exchange.
    #[must_use]
    pub fn failed(id: impl Into<String>, err: Value) -> Self {
        Self {
            id: Some(id.into()),
            response: None,
            err: Some(err),
            is_disposed: true,
        }
    }

    /// Whether this reply ends the exchange for its `id`.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_disposed || self.err.is_some()
    }

    /// Human-readable message of the `err` field, if any.
    ///
    /// Backends report errors either as a bare string or as an object with a
    /// `message` field; anything else is rendered as JSON.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.err.as_ref().map(|err| match err {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                _ => err.to_string(),
            },
            other => other.to_string(),
        })
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn event_omits_id() {
        let packet = RequestPacket::event("globalEvent", json!({"event": "x"}));
        assert!(packet.is_event());
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json, json!({"pattern": "globalEvent", "data": {"event": "x"}}));
    }

    #[test]
    fn request_carries_id() {
        let packet = RequestPacket::request("abc", "createNotification", json!({"message": "hi"}));
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["pattern"], "createNotification");
        assert_eq!(json["data"]["message"], "hi");
    }

    #[test]
    fn reply_distinguishes_null_from_absent_response() {
        let null: ReplyPacket =
            serde_json::from_value(json!({"id": "1", "response": null, "isDisposed": true}))
                .unwrap();
        assert_eq!(null.response, Some(Value::Null));

        let absent: ReplyPacket =
            serde_json::from_value(json!({"id": "1", "isDisposed": true})).unwrap();
        assert_eq!(absent.response, None);
        assert!(absent.is_final());
    }

    #[test]
    fn partial_reply_is_not_final() {
        let reply: ReplyPacket =
            serde_json::from_value(json!({"id": "7", "response": 1})).unwrap();
        assert!(!reply.is_disposed);
        assert!(!reply.is_final());
    }

    #[test]
    fn error_reply_is_final_even_without_disposed_flag() {
        let reply: ReplyPacket =
            serde_json::from_value(json!({"id": "7", "err": "boom"})).unwrap();
        assert!(reply.is_final());
        assert_eq!(reply.error_message().as_deref(), Some("boom"));
    }

    #[test]
    fn error_message_prefers_message_field() {
        let reply = ReplyPacket::failed("1", json!({"status": "error", "message": "not found"}));
        assert_eq!(reply.error_message().as_deref(), Some("not found"));

        let reply = ReplyPacket::failed("1", json!({"code": 4}));
        assert_eq!(reply.error_message().as_deref(), Some("{\"code\":4}"));
    }
}
