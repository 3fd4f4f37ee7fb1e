//! Event bridge infrastructure for szmaterlok.
//!
//! Every user-visible state change (messages sent, users joining and
//! leaving) is a first-class event published to a central asynchronous
//! bridge and fanned out to registered hooks.
//!
//! # Architecture
//!
//! - **BridgeEvent**: the canonical envelope travelling through the bus
//!   (type, id, creation time, headers, opaque payload bytes)
//! - **BridgeEventHandler**: trait implemented by every event consumer
//! - **Bridge**: asynchronous single-queue dispatcher with graceful drain
//! - **BridgeEventRouter**: type-indexed hook multiplexer with a wildcard set
//! - **BridgeEventProducer**: typed publish helper wrapping JSON payloads
//!
//! This crate has no dependencies on the other workspace crates. Payload
//! data is carried as raw JSON bytes, so consumers decode only the event
//! types they care about.

pub mod bridge;
pub mod event;
pub mod generators;
pub mod producer;

pub use bridge::{Bridge, BridgeEventRouter};
pub use event::{
    BridgeEvent, BridgeEventHandler, BridgeEventType, BridgeHeaders, CONTENT_TYPE_JSON,
    HEADER_CONTENT_TYPE, HEADER_REQUEST_ID,
};
pub use generators::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use producer::BridgeEventProducer;
