use std::convert::Infallible;

use async_stream::stream;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Response};
use axum::Extension;
use log::debug;

use crate::error::{Error, Result as WebResult, WebErrorKind};
use crate::extractors::AuthenticatedSession;
use crate::middleware::RequestId;
use domain::StreamSubscribeRequest;
use service::AppState;
use sse::Unsubscriber;

/// Content type of the server-sent event stream.
const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";

/// SSE event stream handler sending event notifications to clients.
/// Honors the `Last-Event-ID` request header for replaying messages a
/// briefly disconnected client has missed. Requires authentication.
pub(crate) async fn stream_handler(
    State(app_state): State<AppState>,
    AuthenticatedSession(session): AuthenticatedSession,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
) -> WebResult<Response<Body>> {
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    debug!(
        "Establishing event stream. (user_id={}, request_id={request_id})",
        session.id
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    let unsubscribe = app_state.notifier.subscribe(StreamSubscribeRequest {
        session: Some(session),
        request_id,
        last_event_id,
        channel: tx,
    });
    let guard = SubscriptionGuard::new(unsubscribe);

    // Every yielded frame is flushed to the client as its own body
    // chunk, so events arrive immediately instead of being buffered.
    let stream = stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(event.to_stream());
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, CONTENT_TYPE_EVENT_STREAM)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|err| Error::Web(WebErrorKind::Other(err.to_string())))
}

/// Invokes the unsubscriber when the response stream is dropped,
/// covering both an orderly stream end and a client disconnect.
struct SubscriptionGuard {
    unsubscribe: Option<Unsubscriber>,
}

impl SubscriptionGuard {
    fn new(unsubscribe: Unsubscriber) -> Self {
        Self {
            unsubscribe: Some(unsubscribe),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe.unsubscribe();
        }
    }
}
