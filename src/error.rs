use thiserror::Error;

/// Application-wide error type
///
/// Every broker component surfaces one of these kinds; the HTTP boundary maps
/// the kind to a status code and a caller-safe message while the full detail is
/// logged server-side.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] SessionError),

    #[error("caller lacks maintainer access to {repository}")]
    Forbidden { repository: String },

    #[error("invalid request: {message}")]
    Validation { message: String },

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("oauth error: {0}")]
    OAuth(#[from] OAuthError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}

/// Session lookup failures. All of them mean "not logged in" to the caller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session cookie")]
    MissingCookie,

    #[error("session not found")]
    NotFound,

    #[error("stored session is not a valid identity record: {0}")]
    InvalidRecord(#[source] serde_json::Error),

    #[error("session expired")]
    Expired,

    #[error("session store failure: {0}")]
    Store(String),
}

/// Failures talking to the repository host
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("pagination cursor did not advance (page {current} -> {next})")]
    StalledCursor { current: u32, next: u32 },
}

impl UpstreamError {
    /// HTTP status reported by the host, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Key decoding and sealing failures
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("public key is not valid base64: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    #[error("public key must be 32 bytes, got {len}")]
    InvalidKeyLength { len: usize },

    #[error("failed to seal secret value")]
    SealFailed,
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("invalid toml format: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("missing required setting: {key}")]
    MissingValue { key: String },

    #[error("invalid port number: {port}")]
    InvalidPort { port: u16 },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("insecure configuration: {issue}")]
    InsecureConfig { issue: String },
}

/// OAuth login flow errors
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("github rejected the request: {0}")]
    GitHubError(String),

    #[error("failed to parse response: {0}")]
    ParseError(String),
}

/// Server-specific errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server startup failed: {0}")]
    StartupError(String),

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::{http::StatusCode, Json};
        use serde_json::json;
        use tracing::{error, warn};

        let (status, error_message) = match &self {
            AppError::Unauthenticated(err) => {
                warn!("Rejected unauthenticated request: {}", err);
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            AppError::Forbidden { .. } => {
                warn!("{}", self);
                (StatusCode::FORBIDDEN, "forbidden")
            }
            AppError::Validation { message } => {
                warn!("Rejected invalid request: {}", message);
                let body = Json(json!({
                    "error": "invalid request",
                    "message": message,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::Upstream(err) => {
                error!(upstream_status = ?err.status(), "Upstream request failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream request failed")
            }
            _ => {
                error!("Request failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
