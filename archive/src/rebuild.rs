use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use events::{BridgeEvent, BridgeEventHandler};

use crate::store::{ArchiveError, EventArchive};

/// Store of events from the past. With a state archive the application
/// is able to rebuild its process-local state.
#[async_trait]
pub trait StateArchive: Send + Sync {
    /// Sends all archived events through the given channel, grouped
    /// and ordered by their creation date.
    async fn events(&self, out: mpsc::Sender<BridgeEvent>) -> Result<(), ArchiveError>;
}

#[async_trait]
impl StateArchive for EventArchive {
    async fn events(&self, out: mpsc::Sender<BridgeEvent>) -> Result<(), ArchiveError> {
        EventArchive::events(self, out).await
    }
}

/// Rebuilds the state of the application by replaying events from the
/// state archive through a bridge event handler, exactly as a live
/// publish would.
pub struct StateBuilder {
    /// Stores past events.
    pub archive: Arc<dyn StateArchive>,

    /// Rebuilds state by applying hooks to events from the archive.
    pub handler: Arc<dyn BridgeEventHandler>,
}

impl StateBuilder {
    /// Replays the whole archive through the handler, consuming events
    /// synchronously in archive order. Archive read errors are
    /// surfaced; event hooks are idempotent by key, so no partial
    /// state is rolled back.
    pub async fn rebuild(&self) -> Result<(), ArchiveError> {
        let (tx, mut rx) = mpsc::channel(1);

        let archive = Arc::clone(&self.archive);
        let reader = tokio::spawn(async move { archive.events(tx).await });

        while let Some(event) = rx.recv().await {
            self.handler.event_hook(event).await;
        }

        reader.await?
    }
}
