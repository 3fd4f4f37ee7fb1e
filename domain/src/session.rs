use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use events::{Clock, IdGenerator};

use crate::tokenizer::SessionTokenizer;

/// Name of the http cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "SzmaterlokSession";

/// Sessions are valid for one week after issuance.
const SESSION_EXPIRATION_DAYS: i64 = 7;

/// Errors of the session subsystem. The web layer maps every variant
/// except `InvalidTokenizerType` to an unauthenticated response;
/// `InvalidTokenizerType` is a fatal startup configuration error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie is missing")]
    MissingCookie,

    #[error("session state expired")]
    SessionExpired,

    #[error("session: missing token")]
    MissingToken,

    #[error("session: invalid tokenizer type name")]
    InvalidTokenizerType,

    #[error("invalid aes key length: {0} bytes, want 16, 24 or 32")]
    InvalidKeyLength(usize),

    #[error("failed to encode session token: {0}")]
    Encode(String),

    #[error("failed to decode session token: {0}")]
    Decode(String),
}

/// Model for user sessions stored in the browser as an opaque token.
///
/// The short JSON keys keep tokens small; the `id` field is the stable
/// user identity used in event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "nck")]
    pub nickname: String,

    pub id: String,

    #[serde(rename = "cat")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "eat")]
    pub expire_at: DateTime<Utc>,
}

/// Creates new unique session states.
pub struct SessionStateFactory {
    expiration_time: Duration,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl SessionStateFactory {
    pub fn new(id_generator: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            expiration_time: Duration::days(SESSION_EXPIRATION_DAYS),
            id_generator,
            clock,
        }
    }

    /// Creates a new unique session state for the given nickname.
    pub fn make_state(&self, nickname: &str) -> SessionState {
        let now = self.clock.now();
        SessionState {
            nickname: nickname.to_owned(),
            id: self.id_generator.generate_id(),
            created_at: now,
            expire_at: now + self.expiration_time,
        }
    }
}

/// Handles the save and read operations of the session state token
/// within http cookies. Works on raw header values so it stays free of
/// any http framework types.
pub struct SessionCookieStore {
    /// Expiration of the http cookie itself. It can differ from the
    /// session state expiration date, but the state's one wins: a
    /// valid cookie with an expired session state is invalid.
    expiration_time: Duration,

    tokenizer: Arc<dyn SessionTokenizer>,

    clock: Arc<dyn Clock>,
}

impl SessionCookieStore {
    pub fn new(tokenizer: Arc<dyn SessionTokenizer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            expiration_time: Duration::days(SESSION_EXPIRATION_DAYS),
            tokenizer,
            clock,
        }
    }

    /// Returns the session state carried by the given `Cookie` request
    /// header value.
    pub fn session_state(&self, cookie_header: Option<&str>) -> Result<SessionState, SessionError> {
        let header = cookie_header.ok_or(SessionError::MissingCookie)?;
        let token = cookie_value(header, SESSION_COOKIE_NAME).ok_or(SessionError::MissingCookie)?;

        let state = self.tokenizer.token_decode(token)?;

        if state.expire_at < self.clock.now() {
            return Err(SessionError::SessionExpired);
        }

        Ok(state)
    }

    /// Renders the `Set-Cookie` header value persisting the given
    /// session state in the browser.
    pub fn save_session_state(&self, state: &SessionState) -> Result<String, SessionError> {
        let token = self.tokenizer.token_encode(state)?;
        let expires = format_http_date(self.clock.now() + self.expiration_time);
        Ok(format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; Expires={expires}; HttpOnly"
        ))
    }

    /// Renders the `Set-Cookie` header value deleting the session
    /// cookie.
    pub fn clear_state(&self) -> String {
        let expires = format_http_date(self.clock.now() - Duration::seconds(1));
        format!("{SESSION_COOKIE_NAME}=; Path=/; Expires={expires}; HttpOnly")
    }
}

fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Looks up the value of a single cookie inside a raw `Cookie` header.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
