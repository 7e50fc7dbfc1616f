use crate::error::AppError;
use crate::security::AuditEvent;
use crate::server::app::AppState;
use crate::session::{build_cookie, clear_cookie, extract_cookie, random_token, CookieOptions, UserProfile};
use axum::{
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, SET_COOKIE},
        HeaderMap,
    },
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const OAUTH_STATE_MAX_AGE_SECS: u64 = 600;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn state_cookie_options(state: &AppState) -> CookieOptions {
    CookieOptions {
        http_only: true,
        secure: state.sessions.secure_cookies(),
    }
}

/// `GET /auth/github`: start the authorization-code flow
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if state.sessions.load(&headers).await.is_ok() {
        return Ok(Redirect::to("/").into_response());
    }

    let oauth_state = random_token();
    let authorize_url = state.oauth.authorization_url(&oauth_state)?;
    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        &oauth_state,
        OAUTH_STATE_MAX_AGE_SECS,
        state_cookie_options(&state),
    );

    Ok(([(SET_COOKIE, cookie)], Redirect::to(&authorize_url)).into_response())
}

/// `GET /auth/github/callback`: finish the flow and open a session
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    if let Some(error) = params.error {
        warn!(error = %error, "GitHub returned an OAuth error");
        return Err(AppError::validation(format!("authorization failed: {error}")));
    }

    let expected = extract_cookie(&headers, OAUTH_STATE_COOKIE)
        .ok_or_else(|| AppError::validation("missing OAuth state cookie"))?;
    let provided = params
        .state
        .ok_or_else(|| AppError::validation("missing state parameter"))?;
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        warn!("OAuth state mismatch");
        return Err(AppError::validation("OAuth state mismatch"));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation("missing code parameter"))?;

    let access_token = state.oauth.exchange_code(&code).await?;
    let user = state.oauth.get_user(&access_token).await?;
    let email = state.oauth.resolve_email(&user, &access_token).await?;

    let profile = UserProfile {
        id: user.id,
        login: user.login,
        name: user.name,
        email,
        avatar_url: user.avatar_url,
    };
    let login = profile.login.clone();

    let session_cookie = state.sessions.create(profile, access_token).await?;
    state.auditor.record(AuditEvent::LoginSucceeded { login });

    Ok((
        AppendHeaders([
            (SET_COOKIE, session_cookie),
            (SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE, state_cookie_options(&state))),
        ]),
        Redirect::to("/"),
    )
        .into_response())
}

/// `GET /logout/github`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let login = match state.sessions.destroy(&headers).await {
        Ok(login) => login,
        Err(e) => {
            warn!("Failed to delete session on logout: {}", e);
            None
        }
    };

    if login.is_some() {
        info!(login = ?login, "Logging out");
    }
    state.auditor.record(AuditEvent::LoggedOut { login });

    (
        [
            (SET_COOKIE, state.sessions.clear_cookie()),
            (CACHE_CONTROL, "no-cache, no-store, must-revalidate".to_string()),
        ],
        Redirect::temporary("/login"),
    )
        .into_response()
}
