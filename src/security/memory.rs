use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Plaintext secret value supplied by the caller
///
/// Never empty, redacted in `Debug`, and zeroized when dropped. The only way
/// to read it is [`SecretValue::expose`], which the sealer calls right before
/// encryption.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    inner: String,
}

impl SecretValue {
    /// Wrap a plaintext value, rejecting empty input
    pub fn new(value: String) -> Result<Self, AppError> {
        if value.is_empty() {
            return Err(AppError::validation("secret value is required"));
        }
        Ok(Self { inner: value })
    }

    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

/// Bearer credential for the repository host
///
/// Used both for the caller's OAuth token and the service token. Serializable
/// so a session record can carry it, but never printed.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct AccessToken {
    inner: String,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}
