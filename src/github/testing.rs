//! In-process stand-in for the repository host, used by unit and router tests

use crate::broker::{RepositoryIdentity, SecretName};
use crate::error::UpstreamError;
use crate::github::client::{ClientFactory, RepositoryHost};
use crate::github::scope::{CallerScope, Scope, ServiceScope};
use crate::github::types::{
    EncryptedSecretPayload, Owner, Page, PermissionSet, PublicKeyMaterial, Repository,
    SecretSummary,
};
use crate::security::AccessToken;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded upstream call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub scope: &'static str,
    pub op: &'static str,
    pub target: String,
}

/// Scripted host shared by both scopes. Every call is recorded with the scope
/// of the handle it came through.
#[derive(Default)]
pub struct MockGitHub {
    repository_pages: Vec<Page<Repository>>,
    repositories: HashMap<String, Repository>,
    secret_pages: Vec<Page<SecretSummary>>,
    public_key: Option<PublicKeyMaterial>,
    failures: HashMap<&'static str, u16>,
    put_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    written: Mutex<Vec<EncryptedSecretPayload>>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages for `list_caller_repositories`, linked 1..=n by cursor
    pub fn with_repository_pages(mut self, pages: Vec<Vec<Repository>>) -> Self {
        self.repository_pages = link_pages(pages);
        self
    }

    /// Metadata returned by `get_repository`
    pub fn with_repository(mut self, repo: Repository) -> Self {
        self.repositories
            .insert(repo.full_name.to_ascii_lowercase(), repo);
        self
    }

    pub fn with_secret_pages(mut self, pages: Vec<Vec<&str>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|names| {
                names
                    .into_iter()
                    .map(|name| SecretSummary {
                        name: name.to_string(),
                        created_at: None,
                        updated_at: None,
                    })
                    .collect()
            })
            .collect();
        self.secret_pages = link_pages(pages);
        self
    }

    pub fn with_public_key(mut self, key: PublicKeyMaterial) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Make one operation fail with the given upstream status
    pub fn failing(mut self, op: &'static str, status: u16) -> Self {
        self.failures.insert(op, status);
        self
    }

    /// Hold each `put_repository_secret` this long before it lands
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls to `op` through any scope
    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    /// Number of calls to `op` through a handle of scope `S`
    pub fn count_in<S: Scope>(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.op == op && c.scope == S::LABEL)
            .count()
    }

    pub fn written(&self) -> Vec<EncryptedSecretPayload> {
        self.written.lock().unwrap().clone()
    }

    fn record<S: Scope>(&self, op: &'static str, target: String) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(Call {
            scope: S::LABEL,
            op,
            target,
        });

        match self.failures.get(op) {
            Some(status) => Err(UpstreamError::Status {
                status: *status,
                detail: format!("scripted failure for {op}"),
            }),
            None => Ok(()),
        }
    }
}

fn link_pages<T>(pages: Vec<Vec<T>>) -> Vec<Page<T>> {
    let total = pages.len() as u32;
    pages
        .into_iter()
        .enumerate()
        .map(|(i, items)| {
            let number = i as u32 + 1;
            Page {
                items,
                next_page: (number < total).then_some(number + 1),
            }
        })
        .collect()
}

fn page_at<T: Clone>(pages: &[Page<T>], page: u32) -> Page<T> {
    pages
        .get(page.saturating_sub(1) as usize)
        .cloned()
        .unwrap_or_else(|| Page::last(Vec::new()))
}

#[async_trait]
impl<S: Scope> RepositoryHost<S> for MockGitHub {
    async fn list_caller_repositories(&self, page: u32) -> Result<Page<Repository>, UpstreamError> {
        self.record::<S>("list_caller_repositories", format!("page={page}"))?;
        Ok(page_at(&self.repository_pages, page))
    }

    async fn get_repository(&self, repo: &RepositoryIdentity) -> Result<Repository, UpstreamError> {
        self.record::<S>("get_repository", repo.to_string())?;
        self.repositories
            .get(&repo.to_string().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| UpstreamError::Status {
                status: 404,
                detail: "Not Found".to_string(),
            })
    }

    async fn list_repository_secrets(
        &self,
        repo: &RepositoryIdentity,
        page: u32,
    ) -> Result<Page<SecretSummary>, UpstreamError> {
        self.record::<S>("list_repository_secrets", format!("{repo} page={page}"))?;
        Ok(page_at(&self.secret_pages, page))
    }

    async fn get_repository_public_key(
        &self,
        repo: &RepositoryIdentity,
    ) -> Result<PublicKeyMaterial, UpstreamError> {
        self.record::<S>("get_repository_public_key", repo.to_string())?;
        self.public_key.clone().ok_or_else(|| UpstreamError::Status {
            status: 404,
            detail: "no public key scripted".to_string(),
        })
    }

    async fn put_repository_secret(
        &self,
        repo: &RepositoryIdentity,
        payload: &EncryptedSecretPayload,
    ) -> Result<(), UpstreamError> {
        self.record::<S>(
            "put_repository_secret",
            format!("{repo}/{}", payload.secret_name),
        )?;
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        self.written.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn delete_repository_secret(
        &self,
        repo: &RepositoryIdentity,
        name: &SecretName,
    ) -> Result<(), UpstreamError> {
        self.record::<S>("delete_repository_secret", format!("{repo}/{name}"))?;
        Ok(())
    }
}

/// Factory handing the same mock out for both scopes
pub struct MockClientFactory {
    pub host: Arc<MockGitHub>,
}

impl MockClientFactory {
    pub fn new(host: MockGitHub) -> Self {
        Self {
            host: Arc::new(host),
        }
    }
}

impl ClientFactory for MockClientFactory {
    fn caller(&self, _token: &AccessToken) -> Arc<dyn RepositoryHost<CallerScope>> {
        self.host.clone()
    }

    fn service(&self) -> Arc<dyn RepositoryHost<ServiceScope>> {
        self.host.clone()
    }
}

/// Repository fixture with the given permission flags
pub fn repository(owner: &str, name: &str, permissions: &[(&str, bool)]) -> Repository {
    Repository {
        permissions: Some(permissions.iter().map(|(k, v)| (*k, *v)).collect::<PermissionSet>()),
        ..repository_without_permissions(owner, name)
    }
}

/// Repository fixture for which the host reported no permission block
pub fn repository_without_permissions(owner: &str, name: &str) -> Repository {
    Repository {
        id: 1,
        name: name.to_string(),
        full_name: format!("{owner}/{name}"),
        owner: Owner {
            login: owner.to_string(),
            id: 1,
            avatar_url: None,
        },
        private: true,
        html_url: format!("https://github.com/{owner}/{name}"),
        description: None,
        permissions: None,
    }
}
