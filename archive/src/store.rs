use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait, QueryOrder};
use thiserror::Error;
use tokio::sync::mpsc;

use events::event::UnknownEventType;
use events::{BridgeEvent, BridgeHeaders};

use crate::entity::{self, Entity as Events};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("database failure: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("invalid event headers json: {0}")]
    Headers(#[from] serde_json::Error),

    #[error("invalid archived event type: {0}")]
    EventType(#[from] UnknownEventType),

    #[error("archive consumer is gone")]
    ConsumerClosed,

    #[error("archive reader task failed: {0}")]
    Reader(#[from] tokio::task::JoinError),
}

/// Append-only event store backed by the embedded SQLite database.
/// Concurrent writes are serialized by the connection pool.
pub struct EventArchive {
    db: DatabaseConnection,
}

impl EventArchive {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Durably appends the given event. Storing an id that already
    /// exists is a no-op, which keeps archive writes idempotent when
    /// the archive hook sees replayed events.
    pub async fn store_event(&self, event: &BridgeEvent) -> Result<(), ArchiveError> {
        let headers = serde_json::to_string(&event.headers)?;

        let row = entity::ActiveModel {
            id: Set(event.id.clone()),
            event_type: Set(event.name.as_str().to_owned()),
            created_at: Set(event.created_at),
            headers: Set(headers),
            data: Set(event.data.clone()),
        };

        Events::insert(row)
            .on_conflict(
                OnConflict::column(entity::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    /// Emits every stored event through the given channel, ordered by
    /// creation time ascending with ties broken by id, so replay is
    /// deterministic. Returns once all events have been sent.
    pub async fn events(&self, out: mpsc::Sender<BridgeEvent>) -> Result<(), ArchiveError> {
        let rows = Events::find()
            .order_by_asc(entity::Column::CreatedAt)
            .order_by_asc(entity::Column::Id)
            .all(&self.db)
            .await?;

        for row in rows {
            let headers: BridgeHeaders = serde_json::from_str(&row.headers)?;

            let event = BridgeEvent {
                name: row.event_type.parse()?,
                id: row.id,
                created_at: row.created_at,
                headers,
                data: row.data,
            };

            out.send(event)
                .await
                .map_err(|_| ArchiveError::ConsumerClosed)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::{BridgeEventType, CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE, HEADER_REQUEST_ID};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn archive() -> EventArchive {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        EventArchive::new(db)
    }

    fn event(id: &str, created_at: i64) -> BridgeEvent {
        let mut headers = BridgeHeaders::new();
        headers.insert(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        headers.insert(HEADER_REQUEST_ID, format!("req-{id}"));

        BridgeEvent {
            name: BridgeEventType::MessageSent,
            id: id.to_owned(),
            created_at,
            headers,
            data: format!("{{\"id\":\"{id}\"}}").into_bytes(),
        }
    }

    async fn collect(archive: &EventArchive) -> Vec<BridgeEvent> {
        let (tx, mut rx) = mpsc::channel(1);

        let reader = async { archive.events(tx).await };
        let consumer = async {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        };

        let (result, events) = tokio::join!(reader, consumer);
        result.unwrap();
        events
    }

    #[tokio::test]
    async fn stored_events_replay_in_creation_order() {
        let archive = archive().await;

        archive.store_event(&event("b", 3)).await.unwrap();
        archive.store_event(&event("a", 1)).await.unwrap();
        archive.store_event(&event("c", 2)).await.unwrap();

        let got = collect(&archive).await;
        let ids: Vec<&str> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn store_then_events_round_trips_the_envelope() {
        let archive = archive().await;

        let want = event("evt-1", 1_647_552_239_000_000);
        archive.store_event(&want).await.unwrap();

        let got = collect(&archive).await;
        assert_eq!(got, vec![want]);
    }

    #[tokio::test]
    async fn created_at_ties_break_by_id() {
        let archive = archive().await;

        archive.store_event(&event("z", 5)).await.unwrap();
        archive.store_event(&event("a", 5)).await.unwrap();
        archive.store_event(&event("m", 5)).await.unwrap();

        let got = collect(&archive).await;
        let ids: Vec<&str> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[tokio::test]
    async fn storing_the_same_id_twice_keeps_one_row() {
        let archive = archive().await;

        archive.store_event(&event("evt-1", 1)).await.unwrap();
        archive.store_event(&event("evt-1", 1)).await.unwrap();

        assert_eq!(collect(&archive).await.len(), 1);
    }
}
