use crate::broker::{RepositoryIdentity, SecretName};
use crate::error::{ServerError, UpstreamError};
use crate::github::scope::{CallerScope, Scope, ServiceScope};
use crate::github::types::{
    EncryptedSecretPayload, Page, PublicKeyMaterial, PutSecretBody, Repository, SecretListResponse,
    SecretSummary,
};
use crate::security::AccessToken;
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Public GitHub REST API
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Fixed page size for every listing call
pub const PER_PAGE: u32 = 100;

const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("gh-secret-broker/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_DETAIL: usize = 512;

/// Operations the broker needs from the repository host
///
/// `S` is the scope of the credential the implementation carries. The trait is
/// the same for both scopes; which scope a caller may use is decided by the
/// functions that accept a `RepositoryHost<S>`.
#[async_trait]
pub trait RepositoryHost<S: Scope>: Send + Sync {
    /// Repositories visible to the credential's owner, any affiliation
    async fn list_caller_repositories(&self, page: u32) -> Result<Page<Repository>, UpstreamError>;

    async fn get_repository(&self, repo: &RepositoryIdentity) -> Result<Repository, UpstreamError>;

    async fn list_repository_secrets(
        &self,
        repo: &RepositoryIdentity,
        page: u32,
    ) -> Result<Page<SecretSummary>, UpstreamError>;

    async fn get_repository_public_key(
        &self,
        repo: &RepositoryIdentity,
    ) -> Result<PublicKeyMaterial, UpstreamError>;

    /// Create or update; the host decides which
    async fn put_repository_secret(
        &self,
        repo: &RepositoryIdentity,
        payload: &EncryptedSecretPayload,
    ) -> Result<(), UpstreamError>;

    async fn delete_repository_secret(
        &self,
        repo: &RepositoryIdentity,
        name: &SecretName,
    ) -> Result<(), UpstreamError>;
}

/// Build the HTTP client shared by every upstream handle
pub fn build_http_client() -> Result<Client, ServerError> {
    Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent(USER_AGENT)
        .build()
        .map_err(ServerError::HttpClient)
}

/// GitHub REST client bound to one credential of scope `S`
pub struct GitHubClient<S: Scope> {
    http: Client,
    api_base: String,
    token: AccessToken,
    _scope: PhantomData<fn() -> S>,
}

impl<S: Scope> fmt::Debug for GitHubClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("scope", &S::LABEL)
            .field("api_base", &self.api_base)
            .field("token", &self.token)
            .finish()
    }
}

impl GitHubClient<CallerScope> {
    /// Handle carrying the logged-in caller's OAuth token
    pub fn for_caller(http: Client, api_base: impl Into<String>, token: AccessToken) -> Self {
        Self::with_scope(http, api_base.into(), token)
    }
}

impl GitHubClient<ServiceScope> {
    /// Handle carrying the broker's service token
    pub fn for_service(http: Client, api_base: impl Into<String>, token: AccessToken) -> Self {
        Self::with_scope(http, api_base.into(), token)
    }
}

impl<S: Scope> GitHubClient<S> {
    fn with_scope(http: Client, api_base: String, token: AccessToken) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            _scope: PhantomData,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn repo_path(&self, repo: &RepositoryIdentity) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(repo.owner()),
            urlencoding::encode(repo.name())
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose())
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(header::USER_AGENT, USER_AGENT)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, UpstreamError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail: String = body.chars().take(MAX_ERROR_DETAIL).collect();
        Err(UpstreamError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, UpstreamError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        page: u32,
    ) -> Result<(T, Option<u32>), UpstreamError> {
        debug!(scope = S::LABEL, url = %url, page, "Fetching page");
        let request = self
            .request(Method::GET, url)
            .query(&[("per_page", PER_PAGE), ("page", page)]);
        let response = self.send(request).await?;

        let next_page = response
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        Ok((Self::decode(response).await?, next_page))
    }
}

#[async_trait]
impl<S: Scope> RepositoryHost<S> for GitHubClient<S> {
    async fn list_caller_repositories(&self, page: u32) -> Result<Page<Repository>, UpstreamError> {
        let url = format!("{}/user/repos?type=all", self.api_base);
        let (items, next_page) = self.get_page(&url, page).await?;
        Ok(Page { items, next_page })
    }

    async fn get_repository(&self, repo: &RepositoryIdentity) -> Result<Repository, UpstreamError> {
        let url = self.repo_path(repo);
        let response = self.send(self.request(Method::GET, &url)).await?;
        Self::decode(response).await
    }

    async fn list_repository_secrets(
        &self,
        repo: &RepositoryIdentity,
        page: u32,
    ) -> Result<Page<SecretSummary>, UpstreamError> {
        let url = format!("{}/actions/secrets", self.repo_path(repo));
        let (listing, next_page): (SecretListResponse, _) = self.get_page(&url, page).await?;
        Ok(Page {
            items: listing.secrets,
            next_page,
        })
    }

    async fn get_repository_public_key(
        &self,
        repo: &RepositoryIdentity,
    ) -> Result<PublicKeyMaterial, UpstreamError> {
        let url = format!("{}/actions/secrets/public-key", self.repo_path(repo));
        let response = self.send(self.request(Method::GET, &url)).await?;
        Self::decode(response).await
    }

    async fn put_repository_secret(
        &self,
        repo: &RepositoryIdentity,
        payload: &EncryptedSecretPayload,
    ) -> Result<(), UpstreamError> {
        let url = format!(
            "{}/actions/secrets/{}",
            self.repo_path(repo),
            urlencoding::encode(&payload.secret_name)
        );
        let body = PutSecretBody {
            encrypted_value: &payload.encrypted_value,
            key_id: &payload.key_id,
        };
        self.send(self.request(Method::PUT, &url).json(&body)).await?;
        Ok(())
    }

    async fn delete_repository_secret(
        &self,
        repo: &RepositoryIdentity,
        name: &SecretName,
    ) -> Result<(), UpstreamError> {
        let url = format!(
            "{}/actions/secrets/{}",
            self.repo_path(repo),
            urlencoding::encode(name.as_str())
        );
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }
}

/// Extract the `page` query parameter of the `rel="next"` entry of a `Link`
/// header
pub fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        if !parts.any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }

        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}

/// Hands out repository host handles for both credential scopes
pub trait ClientFactory: Send + Sync {
    /// Per-request handle for the logged-in caller
    fn caller(&self, token: &AccessToken) -> Arc<dyn RepositoryHost<CallerScope>>;

    /// The long-lived service handle
    fn service(&self) -> Arc<dyn RepositoryHost<ServiceScope>>;
}

/// Factory producing real GitHub clients over one shared connection pool
pub struct GitHubClientFactory {
    http: Client,
    api_base: String,
    service: Arc<GitHubClient<ServiceScope>>,
}

impl GitHubClientFactory {
    pub fn new(http: Client, api_base: impl Into<String>, service_token: AccessToken) -> Self {
        let api_base = api_base.into();
        let service = Arc::new(GitHubClient::for_service(
            http.clone(),
            api_base.clone(),
            service_token,
        ));

        Self {
            http,
            api_base,
            service,
        }
    }
}

impl ClientFactory for GitHubClientFactory {
    fn caller(&self, token: &AccessToken) -> Arc<dyn RepositoryHost<CallerScope>> {
        Arc::new(GitHubClient::for_caller(
            self.http.clone(),
            self.api_base.clone(),
            token.clone(),
        ))
    }

    fn service(&self) -> Arc<dyn RepositoryHost<ServiceScope>> {
        self.service.clone()
    }
}
