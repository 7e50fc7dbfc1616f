use crate::broker::pagination::collect_pages;
use crate::broker::permissions::{verify, MaintainerGrant};
use crate::broker::sealing::seal_payload;
use crate::broker::{RepositoryIdentity, SecretName};
use crate::error::{AppError, UpstreamError};
use crate::github::{CallerScope, RepositoryHost, ServiceScope};
use crate::security::SecretValue;
use tracing::info;

/// Names of all secrets in the granted repository, in host order
pub async fn list_secret_names(
    service: &dyn RepositoryHost<ServiceScope>,
    grant: &MaintainerGrant,
) -> Result<Vec<String>, UpstreamError> {
    let repo = grant.repository();
    let secrets = collect_pages(move |page| service.list_repository_secrets(repo, page)).await?;

    Ok(secrets.into_iter().map(|s| s.name).collect())
}

/// Fetch the current public key, seal and upload
pub async fn write_secret(
    service: &dyn RepositoryHost<ServiceScope>,
    grant: &MaintainerGrant,
    name: &SecretName,
    value: &SecretValue,
) -> Result<(), AppError> {
    let repo = grant.repository();
    let key = service.get_repository_public_key(repo).await?;
    let payload = seal_payload(name.as_str(), &key, value)?;

    service.put_repository_secret(repo, &payload).await?;
    info!(repository = %repo, secret = %name, key_id = %payload.key_id, "Secret written");
    Ok(())
}

pub async fn remove_secret(
    service: &dyn RepositoryHost<ServiceScope>,
    grant: &MaintainerGrant,
    name: &SecretName,
) -> Result<(), AppError> {
    let repo = grant.repository();
    service.delete_repository_secret(repo, name).await?;
    info!(repository = %repo, secret = %name, "Secret deleted");
    Ok(())
}

/// Verify with the caller's credential, turning "no access" into `Forbidden`
pub async fn require_grant(
    caller: &dyn RepositoryHost<CallerScope>,
    repo: &RepositoryIdentity,
) -> Result<MaintainerGrant, AppError> {
    verify(caller, repo)
        .await?
        .ok_or_else(|| AppError::Forbidden {
            repository: repo.to_string(),
        })
}

/// Create or update a secret after verifying the caller
pub async fn put_secret(
    caller: &dyn RepositoryHost<CallerScope>,
    service: &dyn RepositoryHost<ServiceScope>,
    repo: &RepositoryIdentity,
    name: &SecretName,
    value: &SecretValue,
) -> Result<(), AppError> {
    let grant = require_grant(caller, repo).await?;
    write_secret(service, &grant, name, value).await
}

/// Delete a secret after verifying the caller
pub async fn delete_secret(
    caller: &dyn RepositoryHost<CallerScope>,
    service: &dyn RepositoryHost<ServiceScope>,
    repo: &RepositoryIdentity,
    name: &SecretName,
) -> Result<(), AppError> {
    let grant = require_grant(caller, repo).await?;
    remove_secret(service, &grant, name).await
}
