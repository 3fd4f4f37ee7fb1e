use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use log::info;

use crate::middleware::request_id::RequestId;

/// Middleware logging one line per served request with the request id
/// correlation.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let start = Instant::now();
    let response = next.run(request).await;

    info!(
        "{method} {uri} {} ({:?}) (request_id={request_id})",
        response.status(),
        start.elapsed(),
    );

    response
}
