// FlowCompare — Actions secret encryption
//
// GitHub only accepts secrets sealed with the repository's X25519 public key
// (libsodium `crypto_box_seal`).

use super::GitHubError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, KEY_SIZE};

/// Seal `value` for the base64-encoded repository key; returns base64 ciphertext.
pub fn seal_secret(public_key_b64: &str, value: &str) -> Result<String, GitHubError> {
    let raw = STANDARD
        .decode(public_key_b64.trim())
        .map_err(|e| GitHubError::Crypto(format!("invalid repository public key: {}", e)))?;
    let bytes: [u8; KEY_SIZE] = raw.as_slice().try_into().map_err(|_| {
        GitHubError::Crypto(format!(
            "repository public key must be {} bytes, got {}",
            KEY_SIZE,
            raw.len()
        ))
    })?;

    let sealed = PublicKey::from(bytes)
        .seal(&mut OsRng, value.as_bytes())
        .map_err(|e| GitHubError::Crypto(e.to_string()))?;
    Ok(STANDARD.encode(sealed))
}
