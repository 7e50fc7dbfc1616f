use crate::broker::{RepositoryIdentity, SecretName};
use crate::error::AppError;
use crate::github::Repository;
use crate::security::{AuditEvent, SecretValue};
use crate::server::app::AppState;
use crate::session::{CurrentUser, UserProfile};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct ProvidersResponse {
    #[serde(rename = "Providers")]
    providers: Vec<&'static str>,
    #[serde(rename = "ProvidersMap")]
    providers_map: BTreeMap<&'static str, &'static str>,
}

#[derive(Deserialize)]
pub struct RepositoryPath {
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
pub struct SecretPath {
    owner: String,
    repo: String,
    name: String,
}

#[derive(Deserialize)]
pub struct PutSecretRequest {
    #[serde(default)]
    value: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "gh-secret-broker",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn ping() -> &'static str {
    "OK"
}

/// Login providers offered to the frontend
pub async fn providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: vec!["github"],
        providers_map: BTreeMap::from([("github", "Github")]),
    })
}

/// Profile of the logged-in user. The access token stays server-side.
pub async fn me(user: CurrentUser) -> Json<UserProfile> {
    Json(user.profile)
}

/// `GET /api/user/repos`
pub async fn list_repositories(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Repository>>, AppError> {
    let repos = state.broker.list_repositories(&user.access_token).await?;

    state.auditor.record(AuditEvent::RepositoriesListed {
        login: user.profile.login,
        count: repos.len(),
    });
    Ok(Json(repos))
}

/// `GET /api/repo/{owner}/{repo}/secrets`
pub async fn list_secrets(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(path): Path<RepositoryPath>,
) -> Result<Json<Vec<String>>, AppError> {
    let repo = RepositoryIdentity::new(path.owner, path.repo)?;

    let result = state.broker.list_secrets(&user.access_token, &repo).await;
    let names = audit_denial(&state, &user, &repo, result)?;

    state.auditor.record(AuditEvent::SecretsListed {
        login: user.profile.login,
        repository: repo.to_string(),
        count: names.len(),
    });
    Ok(Json(names))
}

/// `PUT /api/repo/{owner}/{repo}/secrets/{name}` with `{"value": "..."}`
pub async fn put_secret(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(path): Path<SecretPath>,
    body: Result<Json<PutSecretRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let repo = RepositoryIdentity::new(path.owner, path.repo)?;
    let name = SecretName::new(path.name)?;

    let Json(request) = body.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let value = SecretValue::new(request.value)?;

    let result = state
        .broker
        .put_secret(&user.access_token, &repo, &name, &value)
        .await;
    audit_denial(&state, &user, &repo, result)?;

    state.auditor.record(AuditEvent::SecretWritten {
        login: user.profile.login,
        repository: repo.to_string(),
        secret: name.to_string(),
    });
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/repo/{owner}/{repo}/secrets/{name}`
pub async fn delete_secret(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(path): Path<SecretPath>,
) -> Result<StatusCode, AppError> {
    let repo = RepositoryIdentity::new(path.owner, path.repo)?;
    let name = SecretName::new(path.name)?;

    let result = state
        .broker
        .delete_secret(&user.access_token, &repo, &name)
        .await;
    audit_denial(&state, &user, &repo, result)?;

    state.auditor.record(AuditEvent::SecretDeleted {
        login: user.profile.login,
        repository: repo.to_string(),
        secret: name.to_string(),
    });
    Ok(StatusCode::NO_CONTENT)
}

/// Record an audit event when the broker refused the caller
fn audit_denial<T>(
    state: &AppState,
    user: &CurrentUser,
    repo: &RepositoryIdentity,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if let Err(AppError::Forbidden { .. }) = &result {
        state.auditor.record(AuditEvent::AccessDenied {
            login: user.profile.login.clone(),
            repository: repo.to_string(),
        });
    }
    result
}

/// Fallback for unknown `/api` paths when no frontend is served
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
