use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Request-scoped correlation id, generated for every incoming
/// request and carried into event headers and log lines.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Middleware generating a unique request id and storing it as a
/// request extension.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(RequestId(Uuid::new_v4().to_string()));

    next.run(request).await
}
