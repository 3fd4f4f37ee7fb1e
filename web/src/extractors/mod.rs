use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{Error, WebErrorKind};
use domain::SessionState;

/// Session state of the authenticated user, inserted by the
/// `session_required` middleware. Handlers taking this extractor can
/// only be reached through an authenticated route.
pub struct AuthenticatedSession(pub SessionState);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionState>()
            .cloned()
            .map(AuthenticatedSession)
            .ok_or_else(|| {
                Error::Web(WebErrorKind::Auth(
                    "This resource requires authentication.".to_owned(),
                ))
            })
    }
}
