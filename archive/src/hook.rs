use std::sync::Arc;

use async_trait::async_trait;
use log::error;

use events::{BridgeEvent, BridgeEventHandler};

use crate::store::EventArchive;

/// Wildcard bridge hook persisting every event to the archive.
///
/// Storage failures are logged and never propagated: from the
/// producer's point of view a publish succeeds even when the durable
/// write behind it does not. Missing rows only surface on the next
/// state rebuild.
pub struct ArchiveHook {
    archive: Arc<EventArchive>,
}

impl ArchiveHook {
    pub fn new(archive: Arc<EventArchive>) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl BridgeEventHandler for ArchiveHook {
    async fn event_hook(&self, event: BridgeEvent) {
        if let Err(err) = self.archive.store_event(&event).await {
            error!(
                "Failed to store event in archive: {err} \
                 (scope=ArchiveHook.event_hook, event_id={}, request_id={})",
                event.id,
                event.request_id()
            );
        }
    }
}
