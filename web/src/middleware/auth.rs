use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::debug;

use crate::error::Error;
use service::AppState;

/// Middleware checking for the presence of a valid session state in
/// the current request.
///
/// Requests without the session cookie, or with an invalid or expired
/// token, are rejected with a 401 JSON error envelope. On success the
/// decoded session state is stored as a request extension, where the
/// [`crate::extractors::AuthenticatedSession`] extractor picks it up.
pub async fn session_required(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_header = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());

    match app_state.session_store.session_state(cookie_header) {
        Ok(state) => {
            request.extensions_mut().insert(state);
            next.run(request).await
        }
        Err(err) => {
            debug!("Rejected unauthenticated request: {err}");
            Error::Session(err).into_response()
        }
    }
}
