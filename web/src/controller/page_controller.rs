use axum::response::Html;

use crate::extractors::AuthenticatedSession;

/// Renders the landing page with the nickname login form.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// Renders the chat application view.
pub async fn chat(AuthenticatedSession(_session): AuthenticatedSession) -> Html<&'static str> {
    Html(include_str!("../../static/chat.html"))
}
