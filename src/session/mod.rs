//! Server-side sessions keyed by an opaque cookie token

pub mod cookies;
pub mod gate;
pub mod store;

pub use cookies::{build_cookie, clear_cookie, extract_cookie, CookieOptions};
pub use gate::CurrentUser;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

use crate::error::SessionError;
use crate::security::AccessToken;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

pub const SESSION_COOKIE: &str = "gh_broker_session";

/// Longest session lifetime accepted, one year
pub const MAX_SESSION_AGE_SECS: u64 = 365 * 86400;

/// 32 random bytes from the thread RNG, URL-safe base64 without padding
pub fn random_token() -> String {
    let mut bytes = Zeroizing::new([0u8; 32]);
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes.as_slice())
}

/// Profile of the logged-in user as shown to the frontend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// What the store keeps for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Cookie handling on top of a [`SessionStore`]
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    secret: Arc<Zeroizing<String>>,
    max_age: Duration,
    secure_cookies: bool,
}

impl Sessions {
    pub fn new(
        store: Arc<dyn SessionStore>,
        secret: impl Into<String>,
        max_age_secs: u64,
        secure_cookies: bool,
    ) -> Self {
        Self {
            store,
            secret: Arc::new(Zeroizing::new(secret.into())),
            max_age: Duration::try_seconds(max_age_secs.min(MAX_SESSION_AGE_SECS) as i64)
                .unwrap_or_else(Duration::zero),
            secure_cookies,
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            http_only: true,
            secure: self.secure_cookies,
        }
    }

    /// Store key for a cookie token. The raw token never reaches the store.
    fn store_key(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(token.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Persist a new session and return the `Set-Cookie` value for it
    pub async fn create(
        &self,
        profile: UserProfile,
        access_token: AccessToken,
    ) -> Result<String, SessionError> {
        let token = random_token();
        let expires_at = Utc::now()
            .checked_add_signed(self.max_age)
            .ok_or_else(|| SessionError::Store("session expiry out of range".to_string()))?;
        let login = profile.login.clone();

        let record = SessionRecord {
            profile,
            access_token,
            expires_at,
        };
        let serialized = serde_json::to_string(&record).map_err(|e| SessionError::Store(e.to_string()))?;

        self.store
            .set(&self.store_key(&token), serialized, expires_at)
            .await?;

        info!(login = %login, expires_at = %expires_at, "Session created");
        Ok(build_cookie(
            SESSION_COOKIE,
            &token,
            self.max_age.num_seconds().max(0) as u64,
            self.cookie_options(),
        ))
    }

    /// Look up the session for a request without modifying it
    pub async fn load(&self, headers: &HeaderMap) -> Result<SessionRecord, SessionError> {
        let token = extract_cookie(headers, SESSION_COOKIE).ok_or(SessionError::MissingCookie)?;

        let serialized = self
            .store
            .get(&self.store_key(&token))
            .await?
            .ok_or(SessionError::NotFound)?;

        let record: SessionRecord =
            serde_json::from_str(&serialized).map_err(SessionError::InvalidRecord)?;

        if record.is_expired(Utc::now()) {
            return Err(SessionError::Expired);
        }

        Ok(record)
    }

    /// Remove the request's session, returning the login it belonged to
    pub async fn destroy(&self, headers: &HeaderMap) -> Result<Option<String>, SessionError> {
        let Some(token) = extract_cookie(headers, SESSION_COOKIE) else {
            return Ok(None);
        };

        let login = self.load(headers).await.ok().map(|record| record.profile.login);
        self.store.delete(&self.store_key(&token)).await?;

        debug!(login = ?login, "Session destroyed");
        Ok(login)
    }

    /// `Set-Cookie` value that drops the session cookie
    pub fn clear_cookie(&self) -> String {
        clear_cookie(SESSION_COOKIE, self.cookie_options())
    }
}
