pub mod auth;
pub mod logging;
pub mod request_id;

pub use auth::session_required;
pub use logging::request_logger;
pub use request_id::{request_id, RequestId};
