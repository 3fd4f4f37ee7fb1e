use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::controller::ApiResponse;
use crate::error::{Error, Result as WebResult, WebErrorKind};
use crate::extractors::AuthenticatedSession;
use crate::middleware::RequestId;
use domain::{ChatUser, EventSentMessage};
use service::AppState;

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    content: String,
}

#[derive(Debug, Serialize)]
struct SendMessageResponse {
    id: String,
}

/// Accepts a chat message and publishes it to all current listeners.
///
/// The publish happens on a detached task relative to the response:
/// the endpoint answers `202 Accepted` with the freshly assigned
/// message id as soon as the payload has been validated.
pub async fn send_message(
    State(app_state): State<AppState>,
    AuthenticatedSession(session): AuthenticatedSession,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Bytes,
) -> WebResult<impl IntoResponse> {
    let request: SendMessageRequest = serde_json::from_slice(&body)
        .map_err(|_| Error::Web(WebErrorKind::Input("Failed to parse body.".to_owned())))?;

    if request.content.len() > app_state.config.max_message_size {
        return Err(Error::Web(WebErrorKind::Input(
            "Message content is too large.".to_owned(),
        )));
    }

    let message_id = app_state.id_generator.generate_id();
    let event = EventSentMessage {
        id: message_id.clone(),
        from: ChatUser {
            id: session.id,
            nickname: session.nickname,
        },
        content: request.content,
        sent_at: app_state.clock.now(),
    };

    let producer = Arc::clone(&app_state.message_producer);
    let event_id = event.id.clone();
    tokio::spawn(async move {
        producer.send_event(&request_id, &event_id, &event).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(SendMessageResponse { id: message_id })),
    ))
}
