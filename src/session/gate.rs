use crate::error::AppError;
use crate::security::AccessToken;
use crate::session::{Sessions, UserProfile};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

/// Authenticated caller, extracted from the session cookie
///
/// Handlers taking this parameter only run for requests with a live session;
/// anything else is rejected with 401 before the handler body. The session is
/// read, never refreshed.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: UserProfile,
    pub access_token: AccessToken,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Sessions: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Sessions::from_ref(state);
        let record = sessions.load(&parts.headers).await?;

        Ok(CurrentUser {
            profile: record.profile,
            access_token: record.access_token,
        })
    }
}
