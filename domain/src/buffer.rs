use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::error;
use tokio::sync::mpsc;

use events::{BridgeEvent, BridgeEventHandler, BridgeEventType};
use sse::{Event, Unsubscriber};

use crate::chat::EventSentMessage;
use crate::notifier::{MessageNotifier, StreamSubscribeRequest};

struct RingState {
    slots: Vec<Option<EventSentMessage>>,
    head: usize,
}

/// Thread-safe data structure holding a fixed number of sent-message
/// events. When the buffer is full, a push overwrites the oldest item.
pub struct MessageCircularBuffer {
    ring: Mutex<RingState>,
}

impl MessageCircularBuffer {
    /// Returns a circular buffer with the given capacity. A zero size
    /// is bumped to one slot.
    pub fn new(size: usize) -> Self {
        Self {
            ring: Mutex::new(RingState {
                slots: vec![None; size.max(1)],
                head: 0,
            }),
        }
    }

    /// Appends the given sent-message event to the circular buffer,
    /// overwriting the oldest item when the buffer is full.
    pub fn push_event(&self, event: EventSentMessage) {
        let mut ring = self.ring.lock().unwrap();
        let head = ring.head;
        ring.slots[head] = Some(event);
        ring.head = (head + 1) % ring.slots.len();
    }

    /// Returns a consistent snapshot of all events stored in the
    /// buffer, oldest first.
    pub fn buffered_events(&self) -> Vec<EventSentMessage> {
        let ring = self.ring.lock().unwrap();
        let size = ring.slots.len();

        (0..size)
            .filter_map(|i| ring.slots[(ring.head + i) % size].clone())
            .collect()
    }
}

/// Keeps a fixed number of messages that can be sent to users to give
/// them a brief overview of the current discussion. Fed by the
/// `message-sent` bridge hook.
pub struct LastMessagesBuffer {
    buffer: MessageCircularBuffer,
}

impl LastMessagesBuffer {
    /// Returns a last messages buffer of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            buffer: MessageCircularBuffer::new(size),
        }
    }

    /// Returns all buffered messages that happened after the message
    /// with the given last event id.
    ///
    /// An empty id, or an id that has already been evicted from the
    /// ring, yields the full snapshot. A matched id yields the
    /// insertion-order suffix strictly after the matched event,
    /// excluding the match itself.
    pub fn last_messages(&self, last_event_id: &str) -> Vec<EventSentMessage> {
        let items = self.buffer.buffered_events();

        if last_event_id.is_empty() {
            return items;
        }

        match items.iter().position(|item| item.id == last_event_id) {
            Some(target) => items[target + 1..].to_vec(),
            None => items,
        }
    }
}

#[async_trait]
impl BridgeEventHandler for LastMessagesBuffer {
    /// Listens for `message-sent` events and appends them to the ring.
    async fn event_hook(&self, event: BridgeEvent) {
        let data: EventSentMessage = match serde_json::from_slice(&event.data) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "Failed to decode message-sent event data: {err} \
                     (scope=LastMessagesBuffer.event_hook, event_id={}, request_id={})",
                    event.id,
                    event.request_id()
                );
                return;
            }
        };

        self.buffer.push_event(data);
    }
}

/// Notifier decorator replaying messages from the last messages buffer
/// to freshly subscribed clients before any live delivery.
pub struct MessageNotifierWithBuffer {
    pub notifier: Arc<dyn MessageNotifier>,
    pub buffer: Arc<LastMessagesBuffer>,
}

impl MessageNotifier for MessageNotifierWithBuffer {
    fn subscribe(&self, req: StreamSubscribeRequest) -> Unsubscriber {
        let last_event_id = req.last_event_id.as_deref().unwrap_or("");
        let buffered = self.buffer.last_messages(last_event_id);

        // Replayed frames are staged on a closed channel sized to the
        // replay set, so the forwarding task drains them before it
        // starts relaying live deliveries.
        let (staged_tx, mut staged_rx) = mpsc::channel(buffered.len().max(1));
        for message in &buffered {
            let data = match serde_json::to_vec(message) {
                Ok(data) => data,
                Err(err) => {
                    error!(
                        "Failed to encode buffered event: {err} (event_id={})",
                        message.id
                    );
                    continue;
                }
            };

            let _ = staged_tx.try_send(Event {
                event_type: BridgeEventType::MessageSent.to_string(),
                data,
                id: Some(message.id.clone()),
                retry: None,
            });
        }
        drop(staged_tx);

        // Live deliveries land on the transient channel registered
        // with the inner notifier; the subscriber sees them only once
        // every replayed message has been forwarded.
        let (transient_tx, mut transient_rx) = mpsc::channel(1);
        let subscriber = req.channel.clone();
        tokio::spawn(async move {
            while let Some(message) = staged_rx.recv().await {
                if subscriber.send(message).await.is_err() {
                    return;
                }
            }

            while let Some(message) = transient_rx.recv().await {
                if subscriber.send(message).await.is_err() {
                    return;
                }
            }
        });

        // The inner unsubscriber drops the transient sender out of the
        // fan-out registry, which terminates the forwarding task.
        self.notifier.subscribe(StreamSubscribeRequest {
            session: req.session,
            request_id: req.request_id,
            last_event_id: None,
            channel: transient_tx,
        })
    }
}
