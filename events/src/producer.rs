use std::marker::PhantomData;
use std::sync::Arc;

use log::error;
use serde::Serialize;

use crate::bridge::Bridge;
use crate::event::{
    BridgeEvent, BridgeEventType, BridgeHeaders, CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE,
    HEADER_REQUEST_ID,
};
use crate::generators::Clock;

/// Publishes events of a single payload type to the event bridge.
///
/// Bound at construction to the bridge, the event type and a clock.
/// Payloads are serialized to JSON; the envelope carries the canonical
/// content type and the request correlation id.
pub struct BridgeEventProducer<T> {
    bridge: Arc<Bridge>,
    event_type: BridgeEventType,
    clock: Arc<dyn Clock>,
    _payload: PhantomData<fn(T)>,
}

impl<T: Serialize> BridgeEventProducer<T> {
    pub fn new(bridge: Arc<Bridge>, event_type: BridgeEventType, clock: Arc<dyn Clock>) -> Self {
        Self {
            bridge,
            event_type,
            clock,
            _payload: PhantomData,
        }
    }

    /// Publishes an event with the given payload and unique id.
    ///
    /// Encoding failures are logged and the event is dropped; they are
    /// never propagated to the caller, because production happens
    /// asynchronously relative to the originating request.
    pub async fn send_event(&self, request_id: &str, id: &str, event: &T) {
        let data = match serde_json::to_vec(event) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "Failed to encode event data as json: {err} \
                     (scope=BridgeEventProducer.send_event, event_id={id}, request_id={request_id})"
                );
                return;
            }
        };

        let mut headers = BridgeHeaders::new();
        headers.insert(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        headers.insert(HEADER_REQUEST_ID, request_id);

        self.bridge
            .send_event(BridgeEvent {
                name: self.event_type,
                id: id.to_owned(),
                created_at: self.clock.now().timestamp_micros(),
                headers,
                data,
            })
            .await;
    }
}
