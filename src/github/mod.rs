//! Upstream GitHub REST access, split by credential scope

pub mod client;
pub mod scope;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::{
    build_http_client, ClientFactory, GitHubClient, GitHubClientFactory, RepositoryHost,
    DEFAULT_API_URL, PER_PAGE,
};
pub use scope::{CallerScope, Scope, ServiceScope};
pub use types::{
    EncryptedSecretPayload, Owner, Page, PermissionSet, PublicKeyMaterial, Repository,
    SecretSummary,
};
