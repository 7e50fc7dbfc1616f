use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Security-relevant events emitted by the broker
///
/// Events never carry secret values or tokens, only identifiers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// OAuth login completed and a session was created
    LoginSucceeded { login: String },
    /// Session destroyed on request
    LoggedOut { login: Option<String> },
    /// Caller was refused because they lack maintainer access
    AccessDenied { login: String, repository: String },
    /// Repository enumeration for the caller
    RepositoriesListed { login: String, count: usize },
    /// Secret names listed for a repository
    SecretsListed {
        login: String,
        repository: String,
        count: usize,
    },
    /// Secret created or updated
    SecretWritten {
        login: String,
        repository: String,
        secret: String,
    },
    /// Secret removed
    SecretDeleted {
        login: String,
        repository: String,
        secret: String,
    },
}

impl AuditEvent {
    fn is_denial(&self) -> bool {
        matches!(self, AuditEvent::AccessDenied { .. })
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Records audit events through `tracing` under this module's target
#[derive(Debug, Clone, Default)]
pub struct SecurityAuditor {
    /// Also emit the full JSON entry
    detailed_logging: bool,
}

impl SecurityAuditor {
    pub fn new(detailed_logging: bool) -> Self {
        Self { detailed_logging }
    }

    /// Log an event and return the entry that was written
    pub fn record(&self, event: AuditEvent) -> AuditEntry {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
        };

        match &entry.event {
            AuditEvent::LoginSucceeded { login } => {
                info!(login = %login, "User logged in");
            }
            AuditEvent::LoggedOut { login } => {
                info!(login = ?login, "User logged out");
            }
            AuditEvent::AccessDenied { login, repository } => {
                warn!(login = %login, repository = %repository, "Maintainer access denied");
            }
            AuditEvent::RepositoriesListed { login, count } => {
                info!(login = %login, count, "Listed repositories");
            }
            AuditEvent::SecretsListed {
                login,
                repository,
                count,
            } => {
                info!(login = %login, repository = %repository, count, "Listed secrets");
            }
            AuditEvent::SecretWritten {
                login,
                repository,
                secret,
            } => {
                info!(login = %login, repository = %repository, secret = %secret, "Secret written");
            }
            AuditEvent::SecretDeleted {
                login,
                repository,
                secret,
            } => {
                info!(login = %login, repository = %repository, secret = %secret, "Secret deleted");
            }
        }

        if self.detailed_logging {
            let json = serde_json::to_string(&entry).unwrap_or_default();
            if entry.event.is_denial() {
                warn!("Security audit: {}", json);
            } else {
                info!("Security audit: {}", json);
            }
        }

        entry
    }
}
