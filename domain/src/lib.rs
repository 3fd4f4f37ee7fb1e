//! Chat domain of szmaterlok.
//!
//! Builds the chat semantics on top of the event bridge: typed event
//! payloads, browser session state with its pluggable tokenizer
//! family, the online-users state with its bridge hooks, the last
//! messages ring buffer, and the subscribe decorators which announce
//! presence and replay missed messages to reconnecting clients.

pub mod buffer;
pub mod chat;
pub mod notifier;
pub mod session;
pub mod state;
pub mod tokenizer;

pub use buffer::{LastMessagesBuffer, MessageCircularBuffer, MessageNotifierWithBuffer};
pub use chat::{ChatUser, EventSentMessage, EventUserJoin, EventUserLeft};
pub use notifier::{EventAnnouncer, FanoutNotifier, MessageNotifier, StreamSubscribeRequest};
pub use session::{
    SessionCookieStore, SessionError, SessionState, SessionStateFactory, SESSION_COOKIE_NAME,
};
pub use state::{StateError, StateOnlineUsers, StateUserJoinHook, StateUserLeftHook};
pub use tokenizer::{
    SessionAesTokenizer, SessionAgeTokenizer, SessionSimpleTokenizer, SessionTokenizer,
    SessionTokenizerCache, SessionTokenizerFactory,
};
