use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;

static NAME_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid name segment pattern"));

static SECRET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid secret name pattern"));

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
        .expect("valid hostname pattern")
});

/// Validates request path parameters and configuration values
pub struct InputValidator {
    max_owner_length: usize,
    max_repository_length: usize,
    max_secret_name_length: usize,
    max_host_length: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self {
            max_owner_length: 39, // GitHub login limit
            max_repository_length: 100,
            max_secret_name_length: 255,
            max_host_length: 253, // RFC 1035 limit
        }
    }
}

impl InputValidator {
    /// Validate a repository owner (user or organization login)
    pub fn validate_owner(&self, owner: &str) -> Result<(), AppError> {
        self.validate_segment("owner", owner, self.max_owner_length)
    }

    /// Validate a repository name
    pub fn validate_repository_name(&self, name: &str) -> Result<(), AppError> {
        self.validate_segment("repository name", name, self.max_repository_length)?;

        if name == "." || name == ".." {
            return Err(AppError::validation("repository name cannot be a relative path"));
        }

        Ok(())
    }

    fn validate_segment(&self, what: &str, value: &str, max_len: usize) -> Result<(), AppError> {
        if value.is_empty() {
            return Err(AppError::validation(format!("{what} cannot be empty")));
        }

        if value.len() > max_len {
            return Err(AppError::validation(format!(
                "{what} too long: {} characters",
                value.len()
            )));
        }

        if !NAME_SEGMENT.is_match(value) {
            return Err(AppError::validation(format!(
                "invalid characters in {what}: {}",
                self.sanitize_log_input(value)
            )));
        }

        Ok(())
    }

    /// Validate a secret name against the repository host's naming rules
    pub fn validate_secret_name(&self, name: &str) -> Result<(), AppError> {
        if name.is_empty() {
            return Err(AppError::validation("secret name cannot be empty"));
        }

        if name.len() > self.max_secret_name_length {
            return Err(AppError::validation(format!(
                "secret name too long: {} characters",
                name.len()
            )));
        }

        // Alphanumerics and underscores only, no leading digit
        if !SECRET_NAME.is_match(name) {
            return Err(AppError::validation(format!(
                "invalid secret name: {}",
                self.sanitize_log_input(name)
            )));
        }

        if name.to_ascii_uppercase().starts_with("GITHUB_") {
            return Err(AppError::validation(
                "secret names must not start with the reserved GITHUB_ prefix",
            ));
        }

        Ok(())
    }

    /// Validate host/domain name
    pub fn validate_host(&self, host: &str) -> Result<(), AppError> {
        if host.is_empty() {
            return Err(AppError::validation("host cannot be empty"));
        }

        if host.len() > self.max_host_length {
            return Err(AppError::validation(format!(
                "host name too long: {} characters",
                host.len()
            )));
        }

        if !HOSTNAME.is_match(host) {
            return Err(AppError::validation("invalid host name format"));
        }

        Ok(())
    }

    /// Strip control characters and cap length before a value reaches the logs
    pub fn sanitize_log_input(&self, input: &str) -> String {
        input
            .chars()
            .filter(|c| c.is_ascii() && !c.is_control() || *c == ' ')
            .take(256)
            .collect()
    }
}
