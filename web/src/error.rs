//! Error handling for the web layer.
//!
//! Session and input failures are translated here into HTTP status
//! codes with a JSON error envelope of the shape
//! `{"error":{"code":…,"message":…}}`.

use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::warn;
use serde_json::json;

use domain::SessionError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Session(SessionError),
    Web(WebErrorKind),
}

#[derive(Debug)]
pub enum WebErrorKind {
    Input(String),
    Auth(String),
    Other(String),
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Error::Session(err)
    }
}

fn error_response(code: StatusCode, message: &str) -> Response {
    (
        code,
        Json(json!({
            "error": {
                "code": code.as_u16(),
                "message": message,
            }
        })),
    )
        .into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Session(ref session_error) => self.handle_session_error(session_error),
            Error::Web(ref web_error_kind) => self.handle_web_error(web_error_kind),
        }
    }
}

impl Error {
    fn handle_session_error(&self, session_error: &SessionError) -> Response {
        match session_error {
            SessionError::InvalidTokenizerType => {
                warn!(
                    "SessionError::InvalidTokenizerType: Responding with 500 Internal Server \
                     Error. Error: {self:?}"
                );
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.",
                )
            }
            _ => {
                warn!("SessionError: Responding with 401 Unauthorized. Error: {self:?}");
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "You are not authorized to access these resources.",
                )
            }
        }
    }

    fn handle_web_error(&self, web_error_kind: &WebErrorKind) -> Response {
        match web_error_kind {
            WebErrorKind::Input(message) => {
                warn!("WebErrorKind::Input: Responding with 400 Bad Request. Error: {self:?}");
                error_response(StatusCode::BAD_REQUEST, message)
            }
            WebErrorKind::Auth(message) => {
                warn!("WebErrorKind::Auth: Responding with 403 Forbidden. Error: {self:?}");
                error_response(StatusCode::FORBIDDEN, message)
            }
            WebErrorKind::Other(_) => {
                warn!(
                    "WebErrorKind::Other: Responding with 500 Internal Server Error. \
                     Error: {self:?}"
                );
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        }
    }
}
