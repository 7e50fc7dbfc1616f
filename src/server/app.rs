use crate::auth::github::{GitHubOAuthClient, OAuthSettings};
use crate::auth::handlers::{callback, login, logout};
use crate::broker::SecretBroker;
use crate::config::{Config, SessionStoreKind};
use crate::error::{AppError, ConfigError, ServerError};
use crate::github::{build_http_client, ClientFactory, GitHubClientFactory};
use crate::logging::request_span;
use crate::security::{AccessToken, SecurityAuditor};
use crate::server::csrf::{csrf_protect, CsrfSettings};
use crate::server::handlers::{
    delete_secret, health_check, list_repositories, list_secrets, me, not_found, ping, providers,
    put_secret,
};
use crate::server::middleware::{logging_middleware, security_headers};
use crate::session::{FileSessionStore, MemorySessionStore, SessionStore, Sessions};
use axum::{
    extract::FromRef,
    http::StatusCode,
    middleware,
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub broker: SecretBroker,
    pub sessions: Sessions,
    pub oauth: Arc<GitHubOAuthClient>,
    pub auditor: Arc<SecurityAuditor>,
}

impl FromRef<AppState> for Sessions {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl AppState {
    /// Build the state from a validated configuration
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let http = build_http_client()?;

        let clients = Arc::new(GitHubClientFactory::new(
            http.clone(),
            config.github.api_base(),
            AccessToken::new(config.github.pat.clone()),
        ));

        let store: Arc<dyn SessionStore> = match config.session.store {
            SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
            SessionStoreKind::File => {
                let dir = config.session.dir.clone().ok_or_else(|| ConfigError::MissingValue {
                    key: "session.dir".to_string(),
                })?;
                let store = FileSessionStore::open(dir).await.map_err(|e| {
                    ServerError::StartupError(format!("failed to open session store: {e}"))
                })?;
                Arc::new(store)
            }
        };
        info!("Session store: {:?}", config.session.store);

        let secret = config.session.secret.clone().ok_or_else(|| ConfigError::MissingValue {
            key: "session.secret".to_string(),
        })?;
        let sessions = Sessions::new(
            store,
            secret,
            config.session.max_age_secs,
            config.is_production(),
        );

        let oauth = GitHubOAuthClient::new(OAuthSettings::from_config(&config), http);

        Ok(Self::from_parts(config, clients, sessions, oauth))
    }

    /// Assemble the state from already-built collaborators
    pub fn from_parts(
        config: Config,
        clients: Arc<dyn ClientFactory>,
        sessions: Sessions,
        oauth: GitHubOAuthClient,
    ) -> Self {
        let broker = SecretBroker::new(clients, config.github.org.clone());
        let auditor = SecurityAuditor::new(!config.is_production());

        Self {
            config: Arc::new(config),
            broker,
            sessions,
            oauth: Arc::new(oauth),
            auditor: Arc::new(auditor),
        }
    }
}

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    let csrf = CsrfSettings {
        secure: state.sessions.secure_cookies(),
    };

    let protected = Router::new()
        .route("/api/repo/{owner}/{repo}/secrets", get(list_secrets))
        .route(
            "/api/repo/{owner}/{repo}/secrets/{name}",
            put(put_secret).delete(delete_secret),
        )
        .route("/auth/github", get(login))
        .route("/logout/github", get(logout))
        .layer(middleware::from_fn_with_state(csrf, csrf_protect));

    let router = Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/api/me", get(me))
        .route("/api/providers", get(providers))
        .route("/api/user/repos", get(list_repositories))
        .route("/auth/github/callback", get(callback))
        .merge(protected);

    let router = match &state.config.server.static_dir {
        Some(dir) => {
            info!("Serving frontend from {}", dir.display());
            let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
            router.fallback_service(spa)
        }
        None => router.fallback(not_found),
    };

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.server.request_timeout_secs),
        ));

    router.layer(middleware_stack).with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::github::testing::{repository, MockClientFactory, MockGitHub};
    use crate::github::{CallerScope, PublicKeyMaterial};
    use crate::logging::capture::capture_logs;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use crypto_box::{aead::OsRng, SecretKey};
    use crate::session::tests::profile;
    use axum::{
        body::Body,
        http::{header::COOKIE, Method, Request},
        response::Response,
    };
    use tower::ServiceExt;
    use zeroize::Zeroizing;

    /// State over a scripted host, an in-memory session store and an OAuth
    /// client pointed at `oauth_base`
    pub(crate) fn test_state(clients: MockClientFactory, oauth_base: &str) -> AppState {
        let mut config = Config::default();
        config.github.org = "TargetOrg".to_string();

        let sessions = Sessions::new(Arc::new(MemorySessionStore::new()), "k".repeat(32), 3600, false);
        let oauth = GitHubOAuthClient::new(
            OAuthSettings {
                client_id: "client".to_string(),
                client_secret: Zeroizing::new("secret".to_string()),
                redirect_uri: "http://localhost:4000/auth/github/callback".to_string(),
                scopes: vec!["user:email".to_string()],
                web_base: oauth_base.to_string(),
                api_base: oauth_base.to_string(),
            },
            reqwest::Client::new(),
        );

        AppState::from_parts(config, Arc::new(clients), sessions, oauth)
    }

    /// Router plus a `Cookie` header value for a live session
    async fn app_with_session(host: MockGitHub) -> (Router, Arc<MockGitHub>, String) {
        app_with_config(host, |_| {}).await
    }

    async fn app_with_config(
        host: MockGitHub,
        configure: impl FnOnce(&mut Config),
    ) -> (Router, Arc<MockGitHub>, String) {
        let clients = MockClientFactory::new(host);
        let host = clients.host.clone();
        let mut state = test_state(clients, "https://github.com");

        let mut config = (*state.config).clone();
        configure(&mut config);
        state.config = Arc::new(config);

        let set_cookie = state
            .sessions
            .create(profile(), AccessToken::new("gho_user"))
            .await
            .unwrap();
        let session = set_cookie.split(';').next().unwrap().to_string();

        (create_app(state), host, format!("{session}; csrf_token=t"))
    }

    fn request(method: Method, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-csrf-token", "t");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(body).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_health() {
        let app = create_app(test_state(MockClientFactory::new(MockGitHub::new()), "http://unused"));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/ping", None, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "deny");

        let response = app
            .oneshot(request(Method::GET, "/health", None, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_providers() {
        let app = create_app(test_state(MockClientFactory::new(MockGitHub::new()), "http://unused"));

        let response = app
            .oneshot(request(Method::GET, "/api/providers", None, Body::empty()))
            .await
            .unwrap();

        assert_eq!(
            body_json(response).await,
            serde_json::json!({"Providers": ["github"], "ProvidersMap": {"github": "Github"}})
        );
    }

    #[tokio::test]
    async fn test_me_hides_access_token() {
        let (app, _, cookie) = app_with_session(MockGitHub::new()).await;

        let response = app
            .oneshot(request(Method::GET, "/api/me", Some(&cookie), Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["login"], "octocat");
        assert!(body.get("access_token").is_none());
    }

    #[tokio::test]
    async fn test_list_repositories_filters_to_org() {
        let host = MockGitHub::new().with_repository_pages(vec![vec![
            repository("TargetOrg", "repo-1", &[("admin", true), ("maintain", true)]),
            repository("OtherOrg", "repo-2", &[("admin", true)]),
            repository("TargetOrg", "repo-3", &[("push", true)]),
        ]]);
        let (app, _, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(Method::GET, "/api/user/repos", Some(&cookie), Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["full_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["TargetOrg/repo-1"]);
    }

    #[tokio::test]
    async fn test_no_session_is_unauthorized_without_upstream_calls() {
        let (app, host, _) = app_with_session(MockGitHub::new()).await;

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/repo/TargetOrg/repo-1/secrets",
                None,
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "unauthorized");
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_without_maintainer_access_is_forbidden() {
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("push", true)]))
            .with_secret_pages(vec![vec!["SECRET_1"]]);
        let (app, host, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/repo/TargetOrg/repo-1/secrets",
                Some(&cookie),
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "forbidden");
        assert_eq!(host.count_in::<CallerScope>("get_repository"), 1);
        assert_eq!(host.count("list_repository_secrets"), 0);
    }

    #[tokio::test]
    async fn test_list_secrets_for_maintainer() {
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("maintain", true)]))
            .with_secret_pages(vec![vec!["SECRET_1", "SECRET_2"], vec!["SECRET_3"]]);
        let (app, _, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/repo/TargetOrg/repo-1/secrets",
                Some(&cookie),
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!(["SECRET_1", "SECRET_2", "SECRET_3"])
        );
    }

    #[tokio::test]
    async fn test_delete_secret_targets_exact_secret() {
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("admin", true)]));
        let (app, host, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(
                Method::DELETE,
                "/api/repo/TargetOrg/repo-1/secrets/SECRET_1",
                Some(&cookie),
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let deletes: Vec<_> = host
            .calls()
            .into_iter()
            .filter(|c| c.op == "delete_repository_secret")
            .collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].target, "TargetOrg/repo-1/SECRET_1");
        assert_eq!(deletes[0].scope, "service");
    }

    #[tokio::test]
    async fn test_put_empty_value_rejected_before_upstream() {
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("admin", true)]));
        let (app, host, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(
                Method::PUT,
                "/api/repo/TargetOrg/repo-1/secrets/NEW_SECRET",
                Some(&cookie),
                Body::from(r#"{"value":""}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid request");
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_put_malformed_body_rejected() {
        let (app, host, cookie) = app_with_session(MockGitHub::new()).await;

        let response = app
            .oneshot(request(
                Method::PUT,
                "/api/repo/TargetOrg/repo-1/secrets/NEW_SECRET",
                Some(&cookie),
                Body::from("not json"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_put_without_csrf_token_rejected() {
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("admin", true)]));
        let (app, host, cookie) = app_with_session(host).await;
        let session_only = cookie.split(';').next().unwrap().to_string();

        let response = app
            .oneshot(request(
                Method::PUT,
                "/api/repo/TargetOrg/repo-1/secrets/NEW_SECRET",
                Some(&session_only),
                Body::from(r#"{"value":"hunter2"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_path_parameters_rejected() {
        let (app, host, cookie) = app_with_session(MockGitHub::new()).await;

        let response = app
            .oneshot(request(
                Method::DELETE,
                "/api/repo/TargetOrg/repo-1/secrets/bad%20name",
                Some(&cookie),
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic() {
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("admin", true)]))
            .failing("list_repository_secrets", 502);
        let (app, _, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/repo/TargetOrg/repo-1/secrets",
                Some(&cookie),
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream request failed");
        assert!(!body.to_string().contains("scripted"));
    }

    #[tokio::test]
    async fn test_upstream_error_logged_with_request_context() {
        let (logs, _guard) = capture_logs();
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("admin", true)]))
            .failing("list_repository_secrets", 502);
        let (app, _, cookie) = app_with_session(host).await;

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/repo/TargetOrg/repo-1/secrets",
                Some(&cookie),
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("Upstream request failed"))
            .unwrap_or_else(|| panic!("Expected upstream error line in:\n{output}"));
        assert!(line.contains("method=GET"), "{line}");
        assert!(line.contains("path=/api/repo/TargetOrg/repo-1/secrets"), "{line}");
        assert!(line.contains("502"), "{line}");
    }

    #[tokio::test]
    async fn test_request_logs_omit_query_string() {
        let (logs, _guard) = capture_logs();
        let app = create_app(test_state(MockClientFactory::new(MockGitHub::new()), "http://unused"));

        let response = app
            .oneshot(request(
                Method::GET,
                "/auth/github/callback?code=oauth-code-xyz&state=abc",
                Some("oauth_state=other"),
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let output = logs.contents();
        assert!(output.contains("OAuth state mismatch"), "{output}");
        assert!(output.contains("path=/auth/github/callback"), "{output}");
        assert!(!output.contains("oauth-code-xyz"), "{output}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_write_never_lands() {
        let recipient = SecretKey::generate(&mut OsRng);
        let host = MockGitHub::new()
            .with_repository(repository("TargetOrg", "repo-1", &[("admin", true)]))
            .with_public_key(PublicKeyMaterial {
                key_id: "key-1".to_string(),
                key: STANDARD.encode(recipient.public_key().as_bytes()),
            })
            .with_put_delay(Duration::from_secs(60));
        let (app, host, cookie) = app_with_config(host, |config| {
            config.server.request_timeout_secs = 1;
        })
        .await;

        let response = app
            .oneshot(request(
                Method::PUT,
                "/api/repo/TargetOrg/repo-1/secrets/NEW_SECRET",
                Some(&cookie),
                Body::from(r#"{"value":"hunter2"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(host.count("put_repository_secret"), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(host.written().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_without_frontend() {
        let app = create_app(test_state(MockClientFactory::new(MockGitHub::new()), "http://unused"));

        let response = app
            .oneshot(request(Method::GET, "/nowhere", None, Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_frontend_with_index_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>app</html>").unwrap();

        let mut state = test_state(MockClientFactory::new(MockGitHub::new()), "http://unused");
        let mut config = (*state.config).clone();
        config.server.static_dir = Some(dir.path().to_path_buf());
        state.config = Arc::new(config);

        let response = create_app(state)
            .oneshot(request(Method::GET, "/repos/TargetOrg/repo-1", None, Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"<html>app</html>");
    }
}
