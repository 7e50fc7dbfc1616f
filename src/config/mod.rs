pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{Config, Environment, GitHubConfig, ServerConfig, SessionConfig, SessionStoreKind};
