use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Repository owner as reported by the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Repository metadata, including the caller's permissions when the host
/// reports them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionSet>,
}

/// Capability name to granted flag, e.g. `admin`, `maintain`, `push`, `pull`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, bool>);

impl PermissionSet {
    /// Whether a capability is granted. Unknown capabilities are not.
    pub fn allows(&self, capability: &str) -> bool {
        self.0.get(capability).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Entry in a repository's secret listing. Values are never returned by the
/// host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretSummary {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecretListResponse {
    pub secrets: Vec<SecretSummary>,
}

/// Recipient key for sealing a repository secret
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicKeyMaterial {
    pub key_id: String,
    /// Base64 encoded 32-byte X25519 public key
    pub key: String,
}

/// Sealed secret ready to be written upstream
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptedSecretPayload {
    pub secret_name: String,
    pub key_id: String,
    /// Base64 sealed box
    pub encrypted_value: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PutSecretBody<'a> {
    pub encrypted_value: &'a str,
    pub key_id: &'a str,
}

/// One page of a listing plus the cursor to the next one
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }
}
