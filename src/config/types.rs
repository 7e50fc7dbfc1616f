use crate::github::DEFAULT_API_URL;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const GITHUB_WEB_URL: &str = "https://github.com";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub session: SessionConfig,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }

    /// Public base URL, defaulting to `http://localhost:{port}`
    pub fn base_url(&self) -> String {
        match &self.server.base_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.server.port),
        }
    }

    /// OAuth redirect target registered with the GitHub app
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/github/callback", self.base_url())
    }

    /// Human-readable settings with credentials masked
    pub fn summary(&self) -> String {
        let mask = |value: &str| if value.is_empty() { "<unset>" } else { "<redacted>" };
        let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "<unset>".to_string());

        let mut out = String::new();
        out.push_str("[server]\n");
        out.push_str(&format!("  listen       = {}:{}\n", self.server.host, self.server.port));
        out.push_str(&format!("  base_url     = {}\n", self.base_url()));
        out.push_str(&format!("  environment  = {}\n", self.server.environment));
        out.push_str(&format!(
            "  static_dir   = {}\n",
            self.server
                .static_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string())
        ));
        out.push_str(&format!("  timeout      = {}s\n", self.server.request_timeout_secs));
        out.push_str("[github]\n");
        out.push_str(&format!("  org          = {}\n", self.github.org));
        out.push_str(&format!("  api          = {}\n", self.github.api_base()));
        out.push_str(&format!("  enterprise   = {}\n", optional(&self.github.enterprise_url)));
        out.push_str(&format!("  client_id    = {}\n", self.github.client_id));
        out.push_str(&format!("  client_secret= {}\n", mask(&self.github.client_secret)));
        out.push_str(&format!("  pat          = {}\n", mask(&self.github.pat)));
        out.push_str(&format!("  scopes       = {}\n", self.github.scopes.join(" ")));
        out.push_str("[session]\n");
        out.push_str(&format!(
            "  secret       = {}\n",
            mask(self.session.secret.as_deref().unwrap_or(""))
        ));
        out.push_str(&format!("  max_age      = {}s\n", self.session.max_age_secs));
        out.push_str(&format!("  store        = {:?}\n", self.session.store));
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Anything other than `production` is development
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: Option<String>,
    pub environment: Environment,
    /// Built frontend to serve; no static hosting when unset
    pub static_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            base_url: None,
            environment: Environment::Development,
            static_dir: None,
            request_timeout_secs: 30,
        }
    }
}

/// GitHub OAuth app, organization and service token
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub org: String,
    pub client_id: String,
    pub client_secret: String,
    /// Service token used for secret operations
    pub pat: String,
    pub enterprise_url: Option<String>,
    /// Explicit REST base, mainly for tests
    pub api_url: Option<String>,
    pub scopes: Vec<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            pat: String::new(),
            enterprise_url: None,
            api_url: None,
            scopes: vec!["user:email".to_string()],
        }
    }
}

impl GitHubConfig {
    fn enterprise(&self) -> Option<&str> {
        self.enterprise_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// REST API base URL
    pub fn api_base(&self) -> String {
        if let Some(api) = self.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return api.trim_end_matches('/').to_string();
        }
        match self.enterprise() {
            Some(base) => format!("{base}/api/v3"),
            None => DEFAULT_API_URL.to_string(),
        }
    }

    /// Web base hosting the `/login/oauth/*` endpoints
    pub fn web_base(&self) -> String {
        self.enterprise().unwrap_or(GITHUB_WEB_URL).to_string()
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("org", &self.org)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("pat", &"[REDACTED]")
            .field("enterprise_url", &self.enterprise_url)
            .field("api_url", &self.api_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub secret: Option<String>,
    pub max_age_secs: u64,
    pub store: SessionStoreKind,
    /// Directory for the file store
    pub dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            max_age_secs: 86400,
            store: SessionStoreKind::Memory,
            dir: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("max_age_secs", &self.max_age_secs)
            .field("store", &self.store)
            .field("dir", &self.dir)
            .finish()
    }
}
