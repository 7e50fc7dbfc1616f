pub mod audit;
pub mod memory;
pub mod validation;

pub use audit::{AuditEvent, SecurityAuditor};
pub use memory::{AccessToken, SecretValue};
pub use validation::InputValidator;
