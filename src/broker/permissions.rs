use crate::broker::RepositoryIdentity;
use crate::error::UpstreamError;
use crate::github::{CallerScope, PermissionSet, RepositoryHost};
use tracing::debug;

/// The single rule for a missing permission block: treat it as no access
pub fn resolve(permissions: Option<&PermissionSet>) -> PermissionSet {
    permissions.cloned().unwrap_or_default()
}

/// `admin` or `maintain`
pub fn has_maintainer_access(permissions: &PermissionSet) -> bool {
    permissions.allows("admin") || permissions.allows("maintain")
}

/// Proof that the caller's own credential was checked for maintainer access
/// to one repository during this request
///
/// Only [`verify`] creates one. Secret listing and mutation require it.
#[derive(Debug)]
pub struct MaintainerGrant {
    repository: RepositoryIdentity,
}

impl MaintainerGrant {
    pub fn repository(&self) -> &RepositoryIdentity {
        &self.repository
    }
}

/// Does the caller have maintainer access to `repo`?
///
/// Upstream failures, including 404 for a repository the caller cannot see,
/// are errors rather than `false`.
pub async fn check_maintainer_access(
    caller: &dyn RepositoryHost<CallerScope>,
    repo: &RepositoryIdentity,
) -> Result<bool, UpstreamError> {
    let metadata = caller.get_repository(repo).await?;
    let permissions = resolve(metadata.permissions.as_ref());
    let allowed = has_maintainer_access(&permissions);

    debug!(repository = %repo, allowed, "Checked maintainer access");
    Ok(allowed)
}

/// Check access and, when allowed, hand out the grant for `repo`
pub async fn verify(
    caller: &dyn RepositoryHost<CallerScope>,
    repo: &RepositoryIdentity,
) -> Result<Option<MaintainerGrant>, UpstreamError> {
    let grant = check_maintainer_access(caller, repo)
        .await?
        .then(|| MaintainerGrant {
            repository: repo.clone(),
        });
    Ok(grant)
}
