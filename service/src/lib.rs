use std::sync::Arc;

use log::info;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};

use domain::{
    EventSentMessage, MessageNotifier, SessionCookieStore, SessionStateFactory, StateOnlineUsers,
};
use events::{BridgeEventProducer, Clock, IdGenerator};

pub mod config;
pub mod logging;

pub use config::Config;

/// Opens the sqlite event archive, brings its schema up to date and
/// enables write-ahead logging.
pub async fn init_database(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let url = format!("sqlite://{}?mode=rwc", config.database);
    info!("Opening event archive database at {}.", config.database);

    let mut options = ConnectOptions::new(url);
    options
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;

    Ok(db)
}

/// Shared application state passed into the axum router. Needs to
/// implement Clone to be able to be passed into Router as State.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub notifier: Arc<dyn MessageNotifier>,
    pub message_producer: Arc<BridgeEventProducer<EventSentMessage>>,
    pub online_users: Arc<StateOnlineUsers>,
    pub session_store: Arc<SessionCookieStore>,
    pub state_factory: Arc<SessionStateFactory>,
    pub id_generator: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}
