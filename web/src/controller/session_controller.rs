use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use log::info;
use serde::Deserialize;

use crate::error::{Error, Result as WebResult, WebErrorKind};
use service::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    nickname: String,
}

/// Logs the user into the chat. A successful login issues a fresh
/// session state, persists it as the session cookie and redirects the
/// browser to the chat view.
pub async fn login(
    State(app_state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    if form.nickname.is_empty() {
        return Err(Error::Web(WebErrorKind::Input(
            "Nickname cannot be empty.".to_owned(),
        )));
    }

    let state = app_state.state_factory.make_state(&form.nickname);
    let cookie = app_state
        .session_store
        .save_session_state(&state)
        .map_err(|err| Error::Web(WebErrorKind::Other(err.to_string())))?;

    info!(
        "User has logged in. (user_id={}, nickname={})",
        state.id, state.nickname
    );

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/chat")).into_response())
}

/// Logs the user out by clearing the session cookie and redirects the
/// browser back to the landing page.
pub async fn logout(State(app_state): State<AppState>) -> impl IntoResponse {
    let cookie = app_state.session_store.clear_state();

    ([(header::SET_COOKIE, cookie)], Redirect::to("/"))
}
