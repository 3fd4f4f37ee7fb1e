//! Durable event archive for szmaterlok.
//!
//! Every event travelling through the bridge is appended to an
//! embedded SQLite database. On startup the archive is replayed
//! through the same hooks that process live events, which rebuilds the
//! process-local state (online users, last messages buffer) from the
//! durable log.

pub mod entity;
pub mod hook;
pub mod rebuild;
pub mod store;

pub use hook::ArchiveHook;
pub use rebuild::{StateArchive, StateBuilder};
pub use store::{ArchiveError, EventArchive};
