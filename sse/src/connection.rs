use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{error, info, warn};
use tokio::sync::mpsc;

use events::{BridgeEvent, BridgeEventHandler, CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE};

use crate::event::Event;

/// Identifies a single live stream subscription. A single user may
/// hold many concurrent subscriptions, one per browser tab, so
/// uniqueness is per `(user_id, request_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberKey {
    pub user_id: String,
    pub request_id: String,
}

/// Arguments for [`MessageFanout::subscribe`].
pub struct FanoutSubscribeRequest {
    /// Stable id of the subscribing user.
    pub user_id: String,

    /// Unique request id. One user, with the same user id, can hold
    /// multiple request ids.
    pub request_id: String,

    /// Channel receiving SSE events for this subscriber.
    pub channel: mpsc::Sender<Event>,
}

/// One-shot handle removing a live subscription. The contract is to
/// call it exactly once; the typical pattern is scoped acquisition at
/// the stream handler.
pub struct Unsubscriber(Option<Box<dyn FnOnce() + Send + 'static>>);

impl Unsubscriber {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Returns an unsubscriber that is safe to invoke and does
    /// nothing. Used for refused subscriptions.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Removes the subscription.
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Registry of live stream subscribers together with the bridge hook
/// which broadcasts events to all of them.
pub struct MessageFanout {
    channels: RwLock<HashMap<SubscriberKey, mpsc::Sender<Event>>>,
}

impl MessageFanout {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes the given channel for SSE events. Returns the
    /// unsubscriber removing the registration.
    pub fn subscribe(self: &Arc<Self>, req: FanoutSubscribeRequest) -> Unsubscriber {
        let key = SubscriberKey {
            user_id: req.user_id,
            request_id: req.request_id,
        };

        self.channels
            .write()
            .unwrap()
            .insert(key.clone(), req.channel);
        info!(
            "Client has subscribed for message fan-out. (user_id={}, request_id={})",
            key.user_id, key.request_id
        );

        let fanout = Arc::clone(self);
        Unsubscriber::new(move || {
            fanout.channels.write().unwrap().remove(&key);
            info!(
                "Client has unsubscribed from message fan-out. (user_id={}, request_id={})",
                key.user_id, key.request_id
            );
        })
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.channels.read().unwrap().len()
    }
}

impl Default for MessageFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeEventHandler for MessageFanout {
    /// Broadcasts the event to every subscribed client.
    ///
    /// Senders are snapshotted under the read lock and the sends
    /// happen sequentially afterwards, so a subscriber channel is
    /// never awaited while the registry lock is held. The send itself
    /// blocks on channel capacity: a slow subscriber stalls fan-out
    /// for everyone, surfacing back-pressure into the producer.
    async fn event_hook(&self, event: BridgeEvent) {
        if event.headers.get(HEADER_CONTENT_TYPE) != CONTENT_TYPE_JSON {
            error!(
                "Invalid content type of event data. \
                 (scope=MessageFanout.event_hook, event_type={}, event_id={}, request_id={})",
                event.name,
                event.id,
                event.request_id()
            );
            return;
        }

        let subscribers: Vec<(SubscriberKey, mpsc::Sender<Event>)> = self
            .channels
            .read()
            .unwrap()
            .iter()
            .map(|(key, sender)| (key.clone(), sender.clone()))
            .collect();

        for (key, sender) in subscribers {
            let delivery = Event {
                event_type: event.name.to_string(),
                data: event.data.clone(),
                id: Some(event.id.clone()),
                retry: None,
            };

            if sender.send(delivery).await.is_err() {
                warn!(
                    "Failed to deliver event to a dropped subscriber. \
                     (user_id={}, request_id={}, event_id={})",
                    key.user_id, key.request_id, event.id
                );
            }
        }
    }
}
