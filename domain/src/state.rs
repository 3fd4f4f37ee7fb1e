use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::error;
use thiserror::Error;

use events::{BridgeEvent, BridgeEventHandler};

use crate::chat::{ChatUser, EventUserJoin, EventUserLeft};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state: there is no such user")]
    NoSuchUser,
}

/// Holds the users which are currently using the chat. Mutated only by
/// the join and left bridge hooks, so it converges with the event
/// stream and can be rebuilt from the archive.
pub struct StateOnlineUsers {
    state: Mutex<HashMap<String, ChatUser>>,
}

impl StateOnlineUsers {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a snapshot of all users currently using the chat.
    /// Order is unspecified.
    pub fn all_chat_users(&self) -> Vec<ChatUser> {
        self.state.lock().unwrap().values().cloned().collect()
    }

    /// Saves the data of a user who is logging in. Upserts by user id.
    pub fn push_chat_user(&self, user: ChatUser) {
        self.state.lock().unwrap().insert(user.id.clone(), user);
    }

    /// Removes the user with the given id from the state storage.
    pub fn remove_chat_user(&self, id: &str) -> Result<(), StateError> {
        self.state
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(StateError::NoSuchUser)
    }
}

impl Default for StateOnlineUsers {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds a new user to the online users storage when they join the chat.
pub struct StateUserJoinHook {
    state: Arc<StateOnlineUsers>,
}

impl StateUserJoinHook {
    pub fn new(state: Arc<StateOnlineUsers>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BridgeEventHandler for StateUserJoinHook {
    async fn event_hook(&self, event: BridgeEvent) {
        let data: EventUserJoin = match serde_json::from_slice(&event.data) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "Failed to decode user-join event data: {err} \
                     (scope=StateUserJoinHook, event_id={}, request_id={})",
                    event.id,
                    event.request_id()
                );
                return;
            }
        };

        self.state.push_chat_user(data.user);
    }
}

/// Removes a user from the online users storage when they leave the
/// chat.
pub struct StateUserLeftHook {
    state: Arc<StateOnlineUsers>,
}

impl StateUserLeftHook {
    pub fn new(state: Arc<StateOnlineUsers>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BridgeEventHandler for StateUserLeftHook {
    async fn event_hook(&self, event: BridgeEvent) {
        let data: EventUserLeft = match serde_json::from_slice(&event.data) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "Failed to decode user-left event data: {err} \
                     (scope=StateUserLeftHook, event_id={}, request_id={})",
                    event.id,
                    event.request_id()
                );
                return;
            }
        };

        if let Err(err) = self.state.remove_chat_user(&data.user.id) {
            error!(
                "Failed to remove user from chat: {err} \
                 (scope=StateUserLeftHook, event_id={}, request_id={})",
                event.id,
                event.request_id()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use events::{BridgeEventType, BridgeHeaders, CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE};

    fn user(id: &str, nickname: &str) -> ChatUser {
        ChatUser {
            id: id.to_owned(),
            nickname: nickname.to_owned(),
        }
    }

    #[test]
    fn push_chat_user_upserts_by_id() {
        let state = StateOnlineUsers::new();

        state.push_chat_user(user("1", "nickname"));
        state.push_chat_user(user("1", "renamed"));

        let users = state.all_chat_users();
        assert_eq!(users, vec![user("1", "renamed")]);
    }

    #[test]
    fn all_chat_users_returns_full_snapshot() {
        let state = StateOnlineUsers::new();

        let want = vec![
            user("1", "Nickname1"),
            user("2", "Nickname2"),
            user("3", "Nickname3"),
        ];
        for u in &want {
            state.push_chat_user(u.clone());
        }

        let mut got = state.all_chat_users();
        got.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(got, want);
    }

    #[test]
    fn remove_chat_user_deletes_entry() {
        let state = StateOnlineUsers::new();
        state.push_chat_user(user("1", "nickname"));

        state.remove_chat_user("1").unwrap();
        assert!(state.all_chat_users().is_empty());
    }

    #[test]
    fn remove_of_missing_user_fails_with_no_such_user() {
        let state = StateOnlineUsers::new();
        assert_eq!(state.remove_chat_user("1"), Err(StateError::NoSuchUser));
    }

    fn bridge_event(name: BridgeEventType, data: Vec<u8>) -> BridgeEvent {
        let mut headers = BridgeHeaders::new();
        headers.insert(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        BridgeEvent {
            name,
            id: "evt-1".to_owned(),
            created_at: 0,
            headers,
            data,
        }
    }

    #[tokio::test]
    async fn join_and_left_hooks_mutate_state() {
        let state = Arc::new(StateOnlineUsers::new());
        let join_hook = StateUserJoinHook::new(state.clone());
        let left_hook = StateUserLeftHook::new(state.clone());

        let join = EventUserJoin {
            id: "evt-1".to_owned(),
            user: user("1", "karol"),
            joined_at: Utc::now(),
        };
        join_hook
            .event_hook(bridge_event(
                BridgeEventType::UserJoin,
                serde_json::to_vec(&join).unwrap(),
            ))
            .await;
        assert_eq!(state.all_chat_users(), vec![user("1", "karol")]);

        let left = EventUserLeft {
            id: "evt-2".to_owned(),
            user: user("1", "karol"),
            left_at: Utc::now(),
        };
        left_hook
            .event_hook(bridge_event(
                BridgeEventType::UserLeft,
                serde_json::to_vec(&left).unwrap(),
            ))
            .await;
        assert!(state.all_chat_users().is_empty());
    }

    #[tokio::test]
    async fn hooks_ignore_undecodable_payloads() {
        let state = Arc::new(StateOnlineUsers::new());
        let join_hook = StateUserJoinHook::new(state.clone());

        join_hook
            .event_hook(bridge_event(
                BridgeEventType::UserJoin,
                b"not json".to_vec(),
            ))
            .await;

        assert!(state.all_chat_users().is_empty());
    }
}
