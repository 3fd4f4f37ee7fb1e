use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::extractors::AuthenticatedSession;
use service::AppState;

/// Lists all users currently online in the chat.
pub async fn index(
    State(app_state): State<AppState>,
    AuthenticatedSession(_session): AuthenticatedSession,
) -> impl IntoResponse {
    let users = app_state.online_users.all_chat_users();

    Json(ApiResponse::new(users))
}
