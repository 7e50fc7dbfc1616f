pub mod github;
pub mod handlers;

pub use github::{GitHubOAuthClient, GitHubUser, OAuthSettings};
