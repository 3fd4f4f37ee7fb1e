//! Server-Sent Events infrastructure for the szmaterlok backend.
//!
//! This crate owns the `text/event-stream` wire encoding and the
//! registry of live stream subscribers.
//!
//! # Architecture
//!
//! - **Event**: a single server-sent event and its wire encoding
//! - **MessageFanout**: per-subscriber channel registry keyed by
//!   `(user_id, request_id)`, with a bridge hook broadcasting every
//!   JSON envelope to all currently subscribed clients
//! - **Unsubscriber**: one-shot handle removing a subscription
//!
//! Delivery to subscribers is blocking on purpose: subscriber channels
//! are small and a slow consumer back-pressures the producer, which is
//! the correct trade for a small single-process chat.

pub mod connection;
pub mod event;

pub use connection::{FanoutSubscribeRequest, MessageFanout, SubscriberKey, Unsubscriber};
pub use event::Event;
