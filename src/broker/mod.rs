//! Privilege-separated secret operations
//!
//! Every listing or mutation first checks the caller's own access with their
//! delegated credential; only a successful check produces the
//! [`MaintainerGrant`] that the service-credential operations require.

pub mod pagination;
pub mod permissions;
pub mod repositories;
pub mod sealing;
pub mod secrets;

pub use permissions::MaintainerGrant;

use crate::error::AppError;
use crate::github::{ClientFactory, Repository};
use crate::security::{AccessToken, InputValidator, SecretValue};
use std::fmt;
use std::sync::Arc;

/// Repository addressed by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryIdentity {
    owner: String,
    name: String,
}

impl RepositoryIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, AppError> {
        let owner = owner.into();
        let name = name.into();

        let validator = InputValidator::default();
        validator.validate_owner(&owner)?;
        validator.validate_repository_name(&name)?;

        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive owner comparison
    pub fn owner_matches(&self, org: &str) -> bool {
        self.owner.eq_ignore_ascii_case(org)
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Validated secret identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretName(String);

impl SecretName {
    pub fn new(name: impl Into<String>) -> Result<Self, AppError> {
        let name = name.into();
        InputValidator::default().validate_secret_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry point used by the HTTP layer
///
/// Holds the client factory and the configured organization; each call builds
/// a caller-scoped handle from the session token and uses the shared service
/// handle only after verification.
#[derive(Clone)]
pub struct SecretBroker {
    clients: Arc<dyn ClientFactory>,
    org: String,
}

impl SecretBroker {
    pub fn new(clients: Arc<dyn ClientFactory>, org: impl Into<String>) -> Self {
        Self {
            clients,
            org: org.into(),
        }
    }

    pub async fn list_repositories(&self, token: &AccessToken) -> Result<Vec<Repository>, AppError> {
        let caller = self.clients.caller(token);
        repositories::list_maintained_repositories(caller.as_ref(), &self.org).await
    }

    pub async fn list_secrets(
        &self,
        token: &AccessToken,
        repo: &RepositoryIdentity,
    ) -> Result<Vec<String>, AppError> {
        let caller = self.clients.caller(token);
        let grant = secrets::require_grant(caller.as_ref(), repo).await?;

        let service = self.clients.service();
        Ok(secrets::list_secret_names(service.as_ref(), &grant).await?)
    }

    pub async fn put_secret(
        &self,
        token: &AccessToken,
        repo: &RepositoryIdentity,
        name: &SecretName,
        value: &SecretValue,
    ) -> Result<(), AppError> {
        let caller = self.clients.caller(token);
        let service = self.clients.service();
        secrets::put_secret(caller.as_ref(), service.as_ref(), repo, name, value).await
    }

    pub async fn delete_secret(
        &self,
        token: &AccessToken,
        repo: &RepositoryIdentity,
        name: &SecretName,
    ) -> Result<(), AppError> {
        let caller = self.clients.caller(token);
        let service = self.clients.service();
        secrets::delete_secret(caller.as_ref(), service.as_ref(), repo, name).await
    }
}
