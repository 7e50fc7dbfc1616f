use crate::config::Config;
use crate::error::OAuthError;
use crate::security::AccessToken;
use reqwest::{header, Client, Url};
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

/// OAuth app settings for the authorization-code flow
#[derive(Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Host of `/login/oauth/*`
    pub web_base: String,
    /// REST base for `/user` and `/user/emails`
    pub api_base: String,
}

impl OAuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.github.client_id.clone(),
            client_secret: Zeroizing::new(config.github.client_secret.clone()),
            redirect_uri: config.redirect_uri(),
            scopes: config.github.scopes.clone(),
            web_base: config.github.web_base(),
            api_base: config.github.api_base(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: AccessToken,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Profile from `GET /user`
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Entry from `GET /user/emails`
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

/// GitHub OAuth client
#[derive(Clone)]
pub struct GitHubOAuthClient {
    settings: OAuthSettings,
    http: Client,
}

impl GitHubOAuthClient {
    pub fn new(settings: OAuthSettings, http: Client) -> Self {
        Self { settings, http }
    }

    /// URL to send the browser to, carrying `state`
    pub fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        let mut url = Url::parse(&format!("{}/login/oauth/authorize", self.settings.web_base))
            .map_err(|e| OAuthError::ParseError(format!("invalid authorize URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Trade an authorization code for the caller's access token
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, OAuthError> {
        debug!("Exchanging authorization code for access token");

        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.settings.web_base))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let body = Zeroizing::new(response.text().await?);

        if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
            if !error.error.is_empty() {
                return Err(OAuthError::GitHubError(
                    error.error_description.unwrap_or(error.error),
                ));
            }
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| OAuthError::ParseError(format!("failed to parse token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(OAuthError::GitHubError("empty access token".to_string()));
        }

        debug!(scope = %token.scope, "Access token granted");
        Ok(token.access_token)
    }

    pub async fn get_user(&self, token: &AccessToken) -> Result<GitHubUser, OAuthError> {
        self.get_json("user", token).await
    }

    pub async fn get_emails(&self, token: &AccessToken) -> Result<Vec<GitHubEmail>, OAuthError> {
        self.get_json("user/emails", token).await
    }

    /// Profile email, falling back to the primary verified address
    pub async fn resolve_email(
        &self,
        user: &GitHubUser,
        token: &AccessToken,
    ) -> Result<Option<String>, OAuthError> {
        if let Some(email) = user.email.as_ref().filter(|e| !e.is_empty()) {
            return Ok(Some(email.clone()));
        }

        let emails = self.get_emails(token).await?;
        Ok(emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<T, OAuthError> {
        let response = self
            .http
            .get(format!("{}/{}", self.settings.api_base, path))
            .bearer_auth(token.expose())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::GitHubError(format!(
                "GET /{path} returned {status}: {}",
                body.chars().take(256).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::ParseError(format!("failed to parse /{path} response: {e}")))
    }
}
