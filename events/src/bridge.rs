use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::event::{BridgeEvent, BridgeEventHandler, BridgeEventType};

/// Asynchronous queue for events. It accepts events from different
/// sources spread all across the application and hands them to the
/// configured event handler, one concurrent hook invocation per event.
///
/// Publishers are serialized by the queue: `send_event` returns only
/// after the dispatcher has accepted the envelope, which gives natural
/// back-pressure when the dispatcher is overloaded.
pub struct Bridge {
    queue: Mutex<Option<mpsc::Sender<BridgeEvent>>>,
    closer: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Bridge {
    /// Starts the bridge event loop with the given handler. A `None`
    /// handler silently drops every event and is meant for tests.
    pub fn new(handler: Option<Arc<dyn BridgeEventHandler>>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(run(queue_rx, handler, done_tx));

        Self {
            queue: Mutex::new(Some(queue_tx)),
            closer: Mutex::new(Some(done_rx)),
        }
    }

    /// Sends an event to the bridge. Blocks until the dispatcher has
    /// accepted the envelope. Calling it after `shutdown` is a
    /// programmer error: the event is dropped and an error is logged.
    pub async fn send_event(&self, event: BridgeEvent) {
        let sender = self.queue.lock().unwrap().clone();
        match sender {
            Some(queue) => {
                if queue.send(event).await.is_err() {
                    error!("Event bridge dispatcher has terminated. Dropping event.");
                }
            }
            None => error!("Event bridge is closed. Dropping event."),
        }
    }

    /// Closes the bridge intake and waits for in-flight hook
    /// invocations to finish, bounded by the given timeout. Hook
    /// completions arriving after the deadline are abandoned.
    pub async fn shutdown(&self, timeout: Duration) {
        drop(self.queue.lock().unwrap().take());

        let closer = self.closer.lock().unwrap().take();
        if let Some(done) = closer {
            let _ = tokio::time::timeout(timeout, done).await;
        }
    }
}

/// Main event loop of the bridge. Consumes the queue until every
/// sender is gone, then waits for outstanding hook invocations and
/// signals drain completion.
async fn run(
    mut queue: mpsc::Receiver<BridgeEvent>,
    handler: Option<Arc<dyn BridgeEventHandler>>,
    done: oneshot::Sender<()>,
) {
    let mut jobs = JoinSet::new();

    while let Some(event) = queue.recv().await {
        let Some(handler) = handler.clone() else {
            continue;
        };

        jobs.spawn(async move { handler.event_hook(event).await });

        // Reap already finished invocations so the set does not grow
        // unbounded on a long-lived bridge.
        while jobs.try_join_next().is_some() {}
    }

    while jobs.join_next().await.is_some() {}

    let _ = done.send(());
}

/// Delegates events to the hook handlers registered for their type.
///
/// A single event type can have multiple hooks. Hooks registered under
/// [`BridgeEventType::Glob`] receive every event. All hooks for an
/// event run concurrently and the router returns only after every one
/// of them has completed.
#[derive(Default)]
pub struct BridgeEventRouter {
    hooks: HashMap<BridgeEventType, Vec<Arc<dyn BridgeEventHandler>>>,
}

impl BridgeEventRouter {
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Adds the handler to the hook list for the given event type. The
    /// hook fires whenever the router receives an event with a
    /// matching type.
    ///
    /// All hooks must be registered before mounting the router on the
    /// bridge; the router is not re-hookable in steady state.
    pub fn hook(&mut self, event_type: BridgeEventType, handler: Arc<dyn BridgeEventHandler>) {
        self.hooks.entry(event_type).or_default().push(handler);
    }
}

#[async_trait]
impl BridgeEventHandler for BridgeEventRouter {
    async fn event_hook(&self, event: BridgeEvent) {
        let mut jobs = JoinSet::new();

        if let Some(glob_hooks) = self.hooks.get(&BridgeEventType::Glob) {
            for hook in glob_hooks {
                let hook = Arc::clone(hook);
                let event = event.clone();
                jobs.spawn(async move { hook.event_hook(event).await });
            }
        }

        if event.name != BridgeEventType::Glob {
            if let Some(hooks) = self.hooks.get(&event.name) {
                for hook in hooks {
                    let hook = Arc::clone(hook);
                    let event = event.clone();
                    jobs.spawn(async move { hook.event_hook(event).await });
                }
            }
        }

        while jobs.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BridgeHeaders;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        count: AtomicUsize,
    }

    impl CountingHook {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                count: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BridgeEventHandler for CountingHook {
        async fn event_hook(&self, _event: BridgeEvent) {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event(name: BridgeEventType, id: &str) -> BridgeEvent {
        BridgeEvent {
            name,
            id: id.to_owned(),
            created_at: 0,
            headers: BridgeHeaders::new(),
            data: b"{}".to_vec(),
        }
    }

    #[tokio::test]
    async fn router_fires_typed_and_glob_hooks() {
        let typed = CountingHook::new();
        let glob = CountingHook::new();

        let mut router = BridgeEventRouter::new();
        router.hook(BridgeEventType::MessageSent, typed.clone());
        router.hook(BridgeEventType::Glob, glob.clone());

        router
            .event_hook(event(BridgeEventType::MessageSent, "1"))
            .await;

        assert_eq!(typed.count(), 1);
        assert_eq!(glob.count(), 1);
    }

    #[tokio::test]
    async fn router_fires_only_glob_hooks_for_unhooked_type() {
        let typed = CountingHook::new();
        let glob = CountingHook::new();

        let mut router = BridgeEventRouter::new();
        router.hook(BridgeEventType::MessageSent, typed.clone());
        router.hook(BridgeEventType::Glob, glob.clone());

        router.event_hook(event(BridgeEventType::UserJoin, "1")).await;

        assert_eq!(typed.count(), 0);
        assert_eq!(glob.count(), 1);
    }

    #[tokio::test]
    async fn bridge_completes_hooks_before_shutdown_returns() {
        let hook = CountingHook::new();

        let mut router = BridgeEventRouter::new();
        router.hook(BridgeEventType::Glob, hook.clone());

        let bridge = Bridge::new(Some(Arc::new(router)));

        let total = 16;
        for i in 0..total {
            bridge
                .send_event(event(BridgeEventType::MessageSent, &i.to_string()))
                .await;
        }

        bridge.shutdown(Duration::from_secs(5)).await;

        assert_eq!(hook.count(), total);
    }

    #[tokio::test]
    async fn bridge_with_no_handler_drops_events() {
        let bridge = Bridge::new(None);

        bridge
            .send_event(event(BridgeEventType::MessageSent, "1"))
            .await;

        bridge.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn send_after_shutdown_does_not_panic() {
        let bridge = Bridge::new(None);
        bridge.shutdown(Duration::from_secs(1)).await;

        bridge
            .send_event(event(BridgeEventType::MessageSent, "1"))
            .await;
    }
}
