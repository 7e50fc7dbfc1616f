use crate::error::CryptoError;
use crate::github::{EncryptedSecretPayload, PublicKeyMaterial};
use crate::security::SecretValue;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::{aead::OsRng, PublicKey, KEY_SIZE};

/// Seal `value` for the holder of `key` with an anonymous sealed box
///
/// Compatible with libsodium's `crypto_box_seal`: X25519 with a fresh
/// ephemeral keypair per call, XSalsa20-Poly1305. Output is standard base64.
pub fn seal(key: &PublicKeyMaterial, value: &SecretValue) -> Result<String, CryptoError> {
    let recipient = decode_public_key(&key.key)?;

    let ciphertext = recipient
        .seal(&mut OsRng, value.expose().as_bytes())
        .map_err(|_| CryptoError::SealFailed)?;

    Ok(STANDARD.encode(ciphertext))
}

/// Seal `value` and package it with the key id for upload as `secret_name`
pub fn seal_payload(
    secret_name: &str,
    key: &PublicKeyMaterial,
    value: &SecretValue,
) -> Result<EncryptedSecretPayload, CryptoError> {
    Ok(EncryptedSecretPayload {
        secret_name: secret_name.to_string(),
        key_id: key.key_id.clone(),
        encrypted_value: seal(key, value)?,
    })
}

fn decode_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let bytes: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|raw: Vec<u8>| CryptoError::InvalidKeyLength { len: raw.len() })?;

    Ok(PublicKey::from(bytes))
}
