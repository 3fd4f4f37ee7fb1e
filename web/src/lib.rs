//! HTTP surface of szmaterlok.
//!
//! Wires the axum router, the session cookie middleware and the
//! controllers on top of the shared [`AppState`]. The only network
//! surface of the application lives here.

pub mod controller;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod router;
pub mod sse;

pub use router::define_routes;
pub use service::AppState;
