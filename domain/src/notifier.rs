use std::sync::Arc;

use tokio::sync::mpsc;

use events::{BridgeEventProducer, Clock, IdGenerator};
use sse::{Event, FanoutSubscribeRequest, MessageFanout, Unsubscriber};

use crate::chat::{ChatUser, EventUserJoin, EventUserLeft};
use crate::session::SessionState;

/// Arguments for the subscribe method of [`MessageNotifier`].
pub struct StreamSubscribeRequest {
    /// Session of the subscribing user. Subscriptions without a
    /// session are refused with a no-op unsubscriber.
    pub session: Option<SessionState>,

    /// Unique request id. One user, with the same session, can hold
    /// multiple subscriptions under different request ids.
    pub request_id: String,

    /// Last event id seen by the client, taken from the
    /// `Last-Event-ID` http header on reconnect.
    pub last_event_id: Option<String>,

    /// Channel receiving SSE events for this subscriber.
    pub channel: mpsc::Sender<Event>,
}

/// Sends SSE event notifications to subscribed clients.
pub trait MessageNotifier: Send + Sync {
    /// Subscribes the request's channel for SSE events. Returns the
    /// unsubscriber removing the subscription; call it exactly once.
    fn subscribe(&self, req: StreamSubscribeRequest) -> Unsubscriber;
}

/// Adapts the raw [`MessageFanout`] registry to the notifier seam used
/// by the subscribe decorators.
pub struct FanoutNotifier(Arc<MessageFanout>);

impl FanoutNotifier {
    pub fn new(fanout: Arc<MessageFanout>) -> Self {
        Self(fanout)
    }
}

impl MessageNotifier for FanoutNotifier {
    fn subscribe(&self, req: StreamSubscribeRequest) -> Unsubscriber {
        let Some(session) = req.session else {
            return Unsubscriber::noop();
        };

        self.0.subscribe(FanoutSubscribeRequest {
            user_id: session.id,
            request_id: req.request_id,
            channel: req.channel,
        })
    }
}

/// Wraps a message notifier and announces user presence to every
/// event listener during a single subscribe and unsubscribe action.
///
/// Presence is expressed as ordinary bus events, so the archive, the
/// online users state and every other subscriber converge on a single
/// source of truth.
pub struct EventAnnouncer {
    pub notifier: Arc<dyn MessageNotifier>,
    pub user_join_producer: Arc<BridgeEventProducer<EventUserJoin>>,
    pub user_left_producer: Arc<BridgeEventProducer<EventUserLeft>>,
    pub clock: Arc<dyn Clock>,
    pub id_generator: Arc<dyn IdGenerator>,
}

impl MessageNotifier for EventAnnouncer {
    fn subscribe(&self, req: StreamSubscribeRequest) -> Unsubscriber {
        let Some(session) = req.session.clone() else {
            return Unsubscriber::noop();
        };

        let user = ChatUser {
            id: session.id,
            nickname: session.nickname,
        };
        let request_id = req.request_id.clone();

        let join = EventUserJoin {
            id: self.id_generator.generate_id(),
            user: user.clone(),
            joined_at: self.clock.now(),
        };
        let join_producer = Arc::clone(&self.user_join_producer);
        {
            let request_id = request_id.clone();
            tokio::spawn(async move {
                join_producer.send_event(&request_id, &join.id, &join).await;
            });
        }

        let unsubscribe = self.notifier.subscribe(req);

        let left_producer = Arc::clone(&self.user_left_producer);
        let clock = Arc::clone(&self.clock);
        let id_generator = Arc::clone(&self.id_generator);
        Unsubscriber::new(move || {
            let left = EventUserLeft {
                id: id_generator.generate_id(),
                user,
                left_at: clock.now(),
            };
            tokio::spawn(async move {
                left_producer.send_event(&request_id, &left.id, &left).await;
            });

            unsubscribe.unsubscribe();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use events::{
        Bridge, BridgeEvent, BridgeEventHandler, BridgeEventRouter, BridgeEventType, SystemClock,
        UuidGenerator,
    };
    use std::time::Duration;

    struct CaptureHook(mpsc::UnboundedSender<BridgeEvent>);

    #[async_trait]
    impl BridgeEventHandler for CaptureHook {
        async fn event_hook(&self, event: BridgeEvent) {
            let _ = self.0.send(event);
        }
    }

    struct NoopNotifier;

    impl MessageNotifier for NoopNotifier {
        fn subscribe(&self, _req: StreamSubscribeRequest) -> Unsubscriber {
            Unsubscriber::noop()
        }
    }

    fn session() -> SessionState {
        SessionState {
            nickname: "karol".to_owned(),
            id: "user-1".to_owned(),
            created_at: Utc::now(),
            expire_at: Utc::now() + chrono::Duration::days(7),
        }
    }

    fn announcer(bridge: Arc<Bridge>) -> EventAnnouncer {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        EventAnnouncer {
            notifier: Arc::new(NoopNotifier),
            user_join_producer: Arc::new(BridgeEventProducer::new(
                bridge.clone(),
                BridgeEventType::UserJoin,
                clock.clone(),
            )),
            user_left_producer: Arc::new(BridgeEventProducer::new(
                bridge,
                BridgeEventType::UserLeft,
                clock.clone(),
            )),
            clock,
            id_generator: Arc::new(UuidGenerator),
        }
    }

    #[tokio::test]
    async fn announcer_publishes_join_and_left_events() {
        let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
        let mut router = BridgeEventRouter::new();
        router.hook(BridgeEventType::Glob, Arc::new(CaptureHook(capture_tx)));
        let bridge = Arc::new(Bridge::new(Some(Arc::new(router))));

        let announcer = announcer(bridge.clone());

        let (tx, _rx) = mpsc::channel(1);
        let unsubscribe = announcer.subscribe(StreamSubscribeRequest {
            session: Some(session()),
            request_id: "req-1".to_owned(),
            last_event_id: None,
            channel: tx,
        });

        let join_event = capture_rx.recv().await.expect("expected user-join event");
        assert_eq!(join_event.name, BridgeEventType::UserJoin);
        let join: EventUserJoin = serde_json::from_slice(&join_event.data).unwrap();
        assert_eq!(join.user.id, "user-1");
        assert_eq!(join.user.nickname, "karol");

        unsubscribe.unsubscribe();

        let left_event = capture_rx.recv().await.expect("expected user-left event");
        assert_eq!(left_event.name, BridgeEventType::UserLeft);
        let left: EventUserLeft = serde_json::from_slice(&left_event.data).unwrap();
        assert_eq!(left.user.id, "user-1");

        bridge.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn announcer_refuses_subscription_without_session() {
        let bridge = Arc::new(Bridge::new(None));
        let announcer = announcer(bridge.clone());

        let (tx, _rx) = mpsc::channel(1);
        let unsubscribe = announcer.subscribe(StreamSubscribeRequest {
            session: None,
            request_id: "req-1".to_owned(),
            last_event_id: None,
            channel: tx,
        });

        // The unsubscriber of a refused subscription is a safe no-op.
        unsubscribe.unsubscribe();

        bridge.shutdown(Duration::from_secs(1)).await;
    }
}
