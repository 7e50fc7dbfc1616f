//! GitHub Secret Broker
//!
//! Lets organization maintainers manage GitHub Actions repository secrets
//! through a web session. Every operation is authorized against the caller's
//! own GitHub token; the secret reads and writes themselves go through a
//! separate service token that callers never see.

pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod github;
pub mod logging;
pub mod security;
pub mod server;
pub mod session;
