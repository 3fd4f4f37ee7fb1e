use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Liveness probe of the chat server.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
