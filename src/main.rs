use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::net::TcpListener;

use archive::{ArchiveHook, EventArchive, StateBuilder};
use domain::{
    EventAnnouncer, FanoutNotifier, LastMessagesBuffer, MessageNotifier,
    MessageNotifierWithBuffer, SessionCookieStore, SessionStateFactory, SessionTokenizerFactory,
    StateOnlineUsers, StateUserJoinHook, StateUserLeftHook,
};
use events::{
    Bridge, BridgeEventProducer, BridgeEventRouter, BridgeEventType, Clock, IdGenerator,
    SystemClock, UuidGenerator,
};
use service::{config::Config, logging::Logger, AppState};
use sse::MessageFanout;

/// Deadline for draining in-flight event hooks on shutdown.
const BRIDGE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// Time to live of memoized session token decodes.
const TOKENIZER_CACHE_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("szmaterlok: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::new();
    Logger::init_logger(&config);

    let db = service::init_database(&config).await?;
    let event_archive = Arc::new(EventArchive::new(db));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let id_generator: Arc<dyn IdGenerator> = Arc::new(UuidGenerator);

    let online_users = Arc::new(StateOnlineUsers::new());
    let last_messages = Arc::new(LastMessagesBuffer::new(config.last_messages_buffer_size));
    let fanout = Arc::new(MessageFanout::new());

    // Wildcard hooks see every event; typed hooks keep the
    // process-local state converged with the event stream.
    let mut router = BridgeEventRouter::new();
    router.hook(
        BridgeEventType::Glob,
        Arc::new(ArchiveHook::new(Arc::clone(&event_archive))),
    );
    router.hook(BridgeEventType::Glob, fanout.clone());
    router.hook(BridgeEventType::MessageSent, last_messages.clone());
    router.hook(
        BridgeEventType::UserJoin,
        Arc::new(StateUserJoinHook::new(Arc::clone(&online_users))),
    );
    router.hook(
        BridgeEventType::UserLeft,
        Arc::new(StateUserLeftHook::new(Arc::clone(&online_users))),
    );
    let router = Arc::new(router);

    // Replay the archive through the same hooks which process live
    // events, warming the in-memory state before accepting traffic.
    info!("Rebuilding state from event archive.");
    let builder = StateBuilder {
        archive: event_archive,
        handler: router.clone(),
    };
    builder.rebuild().await?;

    let bridge = Arc::new(Bridge::new(Some(router)));

    let tokenizer = SessionTokenizerFactory {
        timeout: TOKENIZER_CACHE_TIMEOUT,
        clock: clock.clone(),
    }
    .tokenizer(&config.tokenizer, &config.session_secret)?;

    let notifier: Arc<dyn MessageNotifier> = Arc::new(EventAnnouncer {
        notifier: Arc::new(MessageNotifierWithBuffer {
            notifier: Arc::new(FanoutNotifier::new(fanout)),
            buffer: last_messages,
        }),
        user_join_producer: Arc::new(BridgeEventProducer::new(
            bridge.clone(),
            BridgeEventType::UserJoin,
            clock.clone(),
        )),
        user_left_producer: Arc::new(BridgeEventProducer::new(
            bridge.clone(),
            BridgeEventType::UserLeft,
            clock.clone(),
        )),
        clock: clock.clone(),
        id_generator: id_generator.clone(),
    });

    let app_state = AppState {
        message_producer: Arc::new(BridgeEventProducer::new(
            bridge.clone(),
            BridgeEventType::MessageSent,
            clock.clone(),
        )),
        notifier,
        online_users,
        session_store: Arc::new(SessionCookieStore::new(tokenizer, clock.clone())),
        state_factory: Arc::new(SessionStateFactory::new(
            id_generator.clone(),
            clock.clone(),
        )),
        id_generator,
        clock,
        config: config.clone(),
    };

    let listener = TcpListener::bind(&config.address).await?;
    info!("Listening at {}.", config.address);

    // The http server drains first so in-flight publishers finish,
    // then the bridge drains its queue.
    axum::serve(listener, web::define_routes(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down event bridge.");
    bridge.shutdown(BRIDGE_SHUTDOWN_TIMEOUT).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {err}");
    }
}
