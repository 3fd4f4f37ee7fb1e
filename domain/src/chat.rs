use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a single sent message, and the shape of entries returned
/// by the online users listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub nickname: String,
}

/// Payload of a single message sent by a client to all listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSentMessage {
    pub id: String,
    pub from: ChatUser,
    pub content: String,
    #[serde(rename = "sentAt")]
    pub sent_at: DateTime<Utc>,
}

/// Payload of a single user joining the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventUserJoin {
    pub id: String,
    pub user: ChatUser,
    #[serde(rename = "joinedAt")]
    pub joined_at: DateTime<Utc>,
}

/// Payload of a single user leaving the chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventUserLeft {
    pub id: String,
    pub user: ChatUser,
    #[serde(rename = "leftAt")]
    pub left_at: DateTime<Utc>,
}
