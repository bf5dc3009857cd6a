//! Password based protection of credentials stored in project manifests.
//!
//! Projects written by schema 0.6.0 up to 1.1.x carry remote URLs and
//! service credentials as `encrypted:<base64>` strings. The payload is
//! `salt (16) || nonce (24) || XChaCha20-Poly1305 ciphertext`, keyed with
//! Argon2id over the project password.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use thiserror::Error;

use crate::migrations::support::{layers, LayerType};

pub const ENCRYPTED_PREFIX: &str = "encrypted:";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const AAD: &[u8] = b"abc-map/legacy-credentials";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("wrong password")]
    WrongPassword,
    #[error("malformed encrypted value: {0}")]
    Malformed(String),
    #[error("key derivation failed: {0}")]
    Kdf(String),
    #[error("encryption failed")]
    Encrypt,
}

pub trait LegacyCipher: Send + Sync {
    /// Returns the prefixed, encoded form of `plaintext`.
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CryptoError>;

    /// Reverses [`LegacyCipher::encrypt`]. Fails with
    /// [`CryptoError::WrongPassword`] when the value is well formed but does
    /// not authenticate under `password`.
    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String, CryptoError>;
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct KdfParams {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost_kib: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    pub fn for_test() -> Self {
        Self {
            m_cost_kib: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassphraseCipher {
    params: KdfParams,
}

impl PassphraseCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<[u8; 32], CryptoError> {
        let params = Params::new(
            self.params.m_cost_kib,
            self.params.t_cost,
            self.params.p_cost,
            Some(32),
        )
        .map_err(|err| CryptoError::Kdf(err.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut output = [0u8; 32];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut output)
            .map_err(|err| CryptoError::Kdf(err.to_string()))?;
        Ok(output)
    }
}

impl LegacyCipher for PassphraseCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(password, &salt)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| CryptoError::Encrypt)?;
        let sealed = cipher
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: AAD,
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(format!("{ENCRYPTED_PREFIX}{}", STANDARD.encode(blob)))
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String, CryptoError> {
        let encoded = ciphertext
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or_else(|| CryptoError::Malformed("missing encryption prefix".into()))?;
        let blob = STANDARD
            .decode(encoded.trim())
            .map_err(|err| CryptoError::Malformed(err.to_string()))?;
        if blob.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Malformed("ciphertext too short".into()));
        }

        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);
        let key = self.derive_key(password, salt)?;
        let cipher =
            XChaCha20Poly1305::new_from_slice(&key).map_err(|_| CryptoError::WrongPassword)?;
        let plain = cipher
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: sealed,
                    aad: AAD,
                },
            )
            .map_err(|_| CryptoError::WrongPassword)?;
        String::from_utf8(plain).map_err(|_| CryptoError::Malformed("plaintext is not utf-8".into()))
    }
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// JSON pointers of every protected string value present in the manifest,
/// in layer order.
pub fn protected_pointers(manifest: &Value) -> Vec<String> {
    let mut pointers = Vec::new();
    for (index, layer) in layers(manifest).enumerate() {
        let fields: &[&str] = match LayerType::of(layer) {
            Some(LayerType::Wms) => &[
                "remoteUrl",
                "auth/username",
                "auth/password",
            ],
            Some(LayerType::Wmts) => &["capabilitiesUrl", "auth/username", "auth/password"],
            Some(LayerType::Xyz) => &["remoteUrl"],
            _ => &[],
        };
        for field in fields {
            let pointer = format!("/layers/{index}/metadata/{field}");
            if manifest.pointer(&pointer).map_or(false, Value::is_string) {
                pointers.push(pointer);
            }
        }
        if LayerType::of(layer) == Some(LayerType::Wms) {
            let urls = layer
                .pointer("/metadata/remoteUrls")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            for url_index in 0..urls {
                let pointer = format!("/layers/{index}/metadata/remoteUrls/{url_index}");
                if manifest.pointer(&pointer).map_or(false, Value::is_string) {
                    pointers.push(pointer);
                }
            }
        }
    }
    pointers
}

fn encrypted_values(manifest: &Value) -> impl Iterator<Item = &str> {
    protected_pointers(manifest)
        .into_iter()
        .filter_map(move |pointer| manifest.pointer(&pointer).and_then(Value::as_str))
        .filter(|value| is_encrypted(value))
}

/// True when the project declares credentials or holds any encrypted value.
pub fn manifest_contains_credentials(manifest: &Value) -> bool {
    let flagged = manifest
        .pointer("/metadata/containsCredentials")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    flagged || encrypted_values(manifest).next().is_some()
}

/// First encrypted value of the manifest, used to check a password before
/// decrypting everything else.
pub fn extract_witness(manifest: &Value) -> Option<String> {
    encrypted_values(manifest).next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cipher() -> PassphraseCipher {
        PassphraseCipher::new(KdfParams::for_test())
    }

    #[test]
    fn encrypt_then_decrypt_with_same_password() {
        let cipher = cipher();
        let sealed = cipher
            .encrypt("https://maps.example.org/wms?key=abc", "azerty1234")
            .unwrap();
        assert!(is_encrypted(&sealed));
        assert!(!sealed.contains("maps.example.org"));
        let opened = cipher.decrypt(&sealed, "azerty1234").unwrap();
        assert_eq!(opened, "https://maps.example.org/wms?key=abc");
    }

    #[test]
    fn wrong_password_is_distinguished_from_garbage() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret", "azerty1234").unwrap();
        assert_eq!(cipher.decrypt(&sealed, "qwerty"), Err(CryptoError::WrongPassword));
        assert!(matches!(
            cipher.decrypt("encrypted:@@@", "azerty1234"),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            cipher.decrypt("plain", "azerty1234"),
            Err(CryptoError::Malformed(_))
        ));
        assert!(matches!(
            cipher.decrypt("encrypted:AAAA", "azerty1234"),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn finds_protected_fields_and_witness() {
        let manifest = json!({
            "metadata": { "version": "0.6.0", "containsCredentials": true },
            "layers": [
                { "type": "Vector", "metadata": { "id": "v" } },
                { "type": "Wms", "metadata": { "id": "w", "remoteUrl": "http://plain",
                    "auth": { "username": "encrypted:AAA", "password": "encrypted:BBB" } } },
                { "type": "Xyz", "metadata": { "id": "x", "remoteUrl": "encrypted:CCC" } }
            ]
        });
        assert_eq!(
            protected_pointers(&manifest),
            vec![
                "/layers/1/metadata/remoteUrl",
                "/layers/1/metadata/auth/username",
                "/layers/1/metadata/auth/password",
                "/layers/2/metadata/remoteUrl",
            ]
        );
        assert_eq!(extract_witness(&manifest).as_deref(), Some("encrypted:AAA"));
        assert!(manifest_contains_credentials(&manifest));
    }

    #[test]
    fn plain_project_has_no_credentials() {
        let manifest = json!({
            "metadata": { "version": "0.6.0" },
            "layers": [{ "type": "Wms", "metadata": { "remoteUrl": "http://plain" } }]
        });
        assert!(!manifest_contains_credentials(&manifest));
        assert_eq!(extract_witness(&manifest), None);
    }
}
