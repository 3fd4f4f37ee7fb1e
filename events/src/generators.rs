use chrono::{DateTime, Utc};
use uuid::Uuid;

/// System clock. Seam for injecting deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generates unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a new unique id.
    fn generate_id(&self) -> String;
}

/// Random UUID v4 id generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
