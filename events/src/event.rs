use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header carrying the media type of the event payload.
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Header carrying the request-scoped correlation id.
pub const HEADER_REQUEST_ID: &str = "Request-ID";

/// Canonical content type of JSON event payloads.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Event name by which events are grouped. Events of one type share a
/// single payload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeEventType {
    /// A chat message was delivered to the room.
    #[serde(rename = "message-sent")]
    MessageSent,

    /// A user joined the chat.
    #[serde(rename = "user-join")]
    UserJoin,

    /// A user left the chat.
    #[serde(rename = "user-left")]
    UserLeft,

    /// Matches all event types. Router-index sentinel, never emitted.
    #[serde(rename = "*")]
    Glob,
}

impl BridgeEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeEventType::MessageSent => "message-sent",
            BridgeEventType::UserJoin => "user-join",
            BridgeEventType::UserLeft => "user-left",
            BridgeEventType::Glob => "*",
        }
    }
}

impl fmt::Display for BridgeEventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an event type name that is not part of
/// the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bridge event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for BridgeEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message-sent" => Ok(BridgeEventType::MessageSent),
            "user-join" => Ok(BridgeEventType::UserJoin),
            "user-left" => Ok(BridgeEventType::UserLeft),
            "*" => Ok(BridgeEventType::Glob),
            other => Err(UnknownEventType(other.to_owned())),
        }
    }
}

/// Event metadata stored next to the payload, such as the payload
/// content type or the originating request id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeHeaders(HashMap<String, String>);

impl BridgeHeaders {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value associated with the key, or an empty string
    /// when there is none.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }
}

impl FromIterator<(String, String)> for BridgeHeaders {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Single event record and the common interchange form of all events
/// flowing through the szmaterlok event bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEvent {
    /// Event type.
    pub name: BridgeEventType,

    /// Unique event identifier.
    pub id: String,

    /// Creation time as unix epoch microseconds.
    pub created_at: i64,

    /// Event metadata.
    pub headers: BridgeHeaders,

    /// Payload bytes sent or stored with the event. Opaque to the
    /// bridge itself.
    pub data: Vec<u8>,
}

impl BridgeEvent {
    /// Correlation id of the request that produced the event, empty
    /// when the event carries none.
    pub fn request_id(&self) -> &str {
        self.headers.get(HEADER_REQUEST_ID)
    }
}

/// Behaviour for consuming events from the szmaterlok event bridge.
#[async_trait]
pub trait BridgeEventHandler: Send + Sync {
    /// Any generic operation which uses data from the bridge event.
    async fn event_hook(&self, event: BridgeEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_str() {
        for t in [
            BridgeEventType::MessageSent,
            BridgeEventType::UserJoin,
            BridgeEventType::UserLeft,
            BridgeEventType::Glob,
        ] {
            assert_eq!(t.as_str().parse::<BridgeEventType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let err = "message-received".parse::<BridgeEventType>().unwrap_err();
        assert_eq!(err, UnknownEventType("message-received".to_owned()));
    }

    #[test]
    fn headers_get_returns_empty_string_for_missing_key() {
        let mut headers = BridgeHeaders::new();
        headers.insert(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);

        assert_eq!(headers.get(HEADER_CONTENT_TYPE), CONTENT_TYPE_JSON);
        assert_eq!(headers.get(HEADER_REQUEST_ID), "");
    }
}
