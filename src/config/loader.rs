use crate::config::types::{Config, Environment, SessionStoreKind};
use crate::error::ConfigError;
use crate::security::InputValidator;
use crate::session::{random_token, MAX_SESSION_AGE_SECS};
use reqwest::Url;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const MIN_SESSION_SECRET_LEN: usize = 32;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the file (if present) and apply process environment overrides
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] with an injectable environment
    pub fn load_with<F>(path: &str, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            info!("No configuration file at {}, using defaults", path);
            Config::default()
        };

        Self::apply_env_overrides(&mut config, lookup);
        Ok(config)
    }

    /// Load configuration from file with security validation
    pub fn from_file(path: &str) -> Result<Config, ConfigError> {
        Self::validate_config_path(path)?;

        let content = fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read config file {}: {}", path, e);
            ConfigError::FileReadError(e)
        })?;

        Self::validate_config_content(&content)?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            warn!("Failed to parse TOML in {}: {}", path, e);
            ConfigError::TomlParseError(e)
        })?;

        info!("Configuration loaded successfully from {}", path);
        Ok(config)
    }

    /// Environment variables win over the file
    pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_CLIENT_ID") {
            config.github.client_id = v;
        }
        if let Some(v) = get("GITHUB_CLIENT_SECRET") {
            config.github.client_secret = v;
        }
        if let Some(v) = get("GITHUB_ORG") {
            config.github.org = v;
        }
        if let Some(v) = get("GITHUB_PAT") {
            config.github.pat = v;
        }
        if let Some(v) = get("GITHUB_ENTERPRISE_URL") {
            config.github.enterprise_url = Some(v);
        }
        if let Some(v) = get("SESSION_SECRET") {
            config.session.secret = Some(v);
        }
        if let Some(v) = get("ENVIRONMENT") {
            config.server.environment = Environment::parse(&v);
        }
        if let Some(v) = get("BASE_URL") {
            config.server.base_url = Some(v);
        }
    }

    /// Fill generated values and validate; call after all overrides
    pub fn finalize(mut config: Config) -> Result<Config, ConfigError> {
        if config.session.secret.is_none() && !config.is_production() {
            warn!("No session secret configured, generating an ephemeral one; sessions will not survive a restart");
            config.session.secret = Some(random_token());
        }

        Self::validate_config_security(&config)?;
        Ok(config)
    }

    /// Validate configuration file path for security
    fn validate_config_path(path: &str) -> Result<(), ConfigError> {
        if path.contains("../") || path.contains("..\\") {
            warn!("Configuration path contains path traversal: {}", path);
            return Err(ConfigError::ValidationError {
                message: "configuration path contains path traversal sequences".to_string(),
            });
        }

        if path.chars().any(|c| c.is_control()) {
            warn!("Configuration path contains invalid characters");
            return Err(ConfigError::ValidationError {
                message: "configuration path contains invalid characters".to_string(),
            });
        }

        if path.len() > 1024 {
            warn!("Configuration path too long: {} characters", path.len());
            return Err(ConfigError::ValidationError {
                message: format!("configuration path too long: {} characters", path.len()),
            });
        }

        let suspicious_patterns = ["/proc/", "/sys/", "/dev/", "\\\\"];
        for pattern in &suspicious_patterns {
            if path.to_lowercase().contains(pattern) {
                warn!("Configuration path contains suspicious pattern: {}", pattern);
                return Err(ConfigError::ValidationError {
                    message: format!("configuration path contains suspicious pattern: {}", pattern),
                });
            }
        }

        Ok(())
    }

    /// Validate configuration file content before parsing
    fn validate_config_content(content: &str) -> Result<(), ConfigError> {
        // 1MB is far more than any real config
        if content.len() > 1024 * 1024 {
            warn!("Configuration file too large: {} bytes", content.len());
            return Err(ConfigError::ValidationError {
                message: format!("configuration file too large: {} bytes", content.len()),
            });
        }

        if content.contains('\0') {
            warn!("Configuration file contains binary data");
            return Err(ConfigError::ValidationError {
                message: "configuration file appears to contain binary data".to_string(),
            });
        }

        Ok(())
    }

    /// Check the assembled configuration before the server starts
    pub fn validate_config_security(config: &Config) -> Result<(), ConfigError> {
        let validator = InputValidator::default();

        validator
            .validate_host(&config.server.host)
            .map_err(|e| ConfigError::ValidationError {
                message: format!("invalid server host: {}", e),
            })?;

        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort {
                port: config.server.port,
            });
        }

        if config.server.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.request_timeout_secs must be positive".to_string(),
            });
        }

        Self::validate_url("server.base_url", &config.base_url())?;
        if let Some(url) = &config.github.enterprise_url {
            Self::validate_url("github.enterprise_url", url)?;
        }
        if let Some(url) = &config.github.api_url {
            Self::validate_url("github.api_url", url)?;
        }

        let required = [
            ("github.client_id", &config.github.client_id),
            ("github.client_secret", &config.github.client_secret),
            ("github.org", &config.github.org),
            ("github.pat", &config.github.pat),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue {
                    key: key.to_string(),
                });
            }
        }

        validator
            .validate_owner(&config.github.org)
            .map_err(|e| ConfigError::ValidationError {
                message: format!("invalid github.org: {}", e),
            })?;

        match &config.session.secret {
            None => {
                return Err(ConfigError::MissingValue {
                    key: "session.secret".to_string(),
                })
            }
            Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
                return Err(ConfigError::InsecureConfig {
                    issue: format!(
                        "session.secret must be at least {MIN_SESSION_SECRET_LEN} characters"
                    ),
                });
            }
            Some(_) => {}
        }

        if config.session.max_age_secs == 0 || config.session.max_age_secs > MAX_SESSION_AGE_SECS {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "session.max_age_secs must be between 1 and {MAX_SESSION_AGE_SECS}"
                ),
            });
        }

        if config.session.store == SessionStoreKind::File && config.session.dir.is_none() {
            return Err(ConfigError::MissingValue {
                key: "session.dir".to_string(),
            });
        }

        if config.is_production() {
            Self::validate_production_config(config)?;
        }

        Ok(())
    }

    fn validate_production_config(config: &Config) -> Result<(), ConfigError> {
        if !config.base_url().starts_with("https://") {
            warn!("base_url is not https in production; session cookies are marked Secure and will not be sent over plain http");
        }

        if config.session.max_age_secs > 30 * 86400 {
            warn!("Session lifetime is very long: {}s", config.session.max_age_secs);
        }

        Ok(())
    }

    fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::ValidationError {
                message: format!("{key} must be an http(s) URL"),
            }),
        }
    }
}
