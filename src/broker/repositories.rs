use crate::broker::pagination::collect_pages;
use crate::broker::permissions::{has_maintainer_access, resolve};
use crate::error::AppError;
use crate::github::{CallerScope, Repository, RepositoryHost};
use tracing::debug;

/// Repositories owned by `org` that the caller can maintain
///
/// Walks everything visible to the caller's credential and keeps entries whose
/// owner matches `org` case-insensitively and whose permissions grant
/// maintainer access. Host order is preserved.
pub async fn list_maintained_repositories(
    caller: &dyn RepositoryHost<CallerScope>,
    org: &str,
) -> Result<Vec<Repository>, AppError> {
    if org.trim().is_empty() {
        return Err(AppError::internal("organization is not configured"));
    }

    let visible = collect_pages(move |page| caller.list_caller_repositories(page)).await?;
    let total = visible.len();

    let maintained: Vec<Repository> = visible
        .into_iter()
        .filter(|repo| repo.owner.login.eq_ignore_ascii_case(org))
        .filter(|repo| has_maintainer_access(&resolve(repo.permissions.as_ref())))
        .collect();

    debug!(org, total, kept = maintained.len(), "Filtered caller repositories");
    Ok(maintained)
}
