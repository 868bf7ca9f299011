//! # Credentials
//!
//! WebUI credentials read from Kubernetes Secrets, qBittorrent's PBKDF2
//! password format, and generated passwords for operator-managed servers.

use crate::constants::{SECRET_PASSWORD_KEY, SECRET_USERNAME_KEY};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use rand::RngCore;
use sha2::Sha512;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const PBKDF2_ITERATIONS: u32 = 100_000;
const PBKDF2_KEY_LENGTH: usize = 64;
const PBKDF2_SALT_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credentials secret {name:?} not found")]
    SecretNotFound { name: String },

    #[error("credentials secret {name:?} missing '{key}' key")]
    MissingKey { name: String, key: &'static str },

    #[error("credentials secret {name:?} key '{key}' is not valid UTF-8")]
    InvalidEncoding { name: String, key: &'static str },

    #[error("failed to get credentials secret {name:?}: {message}")]
    Lookup { name: String, message: String },
}

/// WebUI username and password, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read `username` and `password` from a Secret's data
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when a key is absent or not UTF-8.
    pub fn from_secret(secret: &Secret) -> Result<Self, CredentialError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        let read = |key: &'static str| -> Result<String, CredentialError> {
            let bytes = secret
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .ok_or_else(|| CredentialError::MissingKey {
                    name: name.clone(),
                    key,
                })?;
            String::from_utf8(bytes.0.clone()).map_err(|_err| CredentialError::InvalidEncoding {
                name: name.clone(),
                key,
            })
        };
        Ok(Self {
            username: read(SECRET_USERNAME_KEY)?,
            password: read(SECRET_PASSWORD_KEY)?,
        })
    }
}

/// Hash a password the way qBittorrent stores `WebUI\Password_PBKDF2`
///
/// PBKDF2-HMAC-SHA512, 100 000 rounds, 16 byte random salt, 64 byte key,
/// rendered as `@ByteArray(<salt b64>:<key b64>)`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; PBKDF2_SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    hash_password_with_salt(password, &salt)
}

fn hash_password_with_salt(password: &str, salt: &[u8]) -> String {
    let mut key = [0u8; PBKDF2_KEY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    let encoded = format!("@ByteArray({}:{})", STANDARD.encode(salt), STANDARD.encode(key));
    key.zeroize();
    encoded
}

/// Random password over the URL-safe base64 alphabet
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut encoded = URL_SAFE.encode(&bytes);
    encoded.truncate(length);
    bytes.zeroize();
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret(entries: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("creds".to_string()),
                ..Default::default()
            },
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("adminadmin");
        let inner = hash
            .strip_prefix("@ByteArray(")
            .and_then(|h| h.strip_suffix(')'))
            .unwrap();
        let (salt, key) = inner.split_once(':').unwrap();
        assert_eq!(STANDARD.decode(salt).unwrap().len(), PBKDF2_SALT_LENGTH);
        assert_eq!(STANDARD.decode(key).unwrap().len(), PBKDF2_KEY_LENGTH);
    }

    #[test]
    fn test_hash_password_is_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_hash_password_is_deterministic_for_salt() {
        let salt = [7u8; PBKDF2_SALT_LENGTH];
        assert_eq!(
            hash_password_with_salt("secret", &salt),
            hash_password_with_salt("secret", &salt)
        );
        assert_ne!(
            hash_password_with_salt("secret", &salt),
            hash_password_with_salt("other", &salt)
        );
    }

    #[test]
    fn test_generate_password() {
        let password = generate_password(16);
        assert_eq!(password.len(), 16);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(password, generate_password(16));
    }

    #[test]
    fn test_credentials_from_secret() {
        let creds = Credentials::from_secret(&secret(&[("username", "admin"), ("password", "pw")]))
            .unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "pw");
        assert!(!format!("{creds:?}").contains("pw"));
    }

    #[test]
    fn test_credentials_missing_key() {
        let err = Credentials::from_secret(&secret(&[("username", "admin")])).unwrap_err();
        assert_eq!(
            err,
            CredentialError::MissingKey {
                name: "creds".to_string(),
                key: "password"
            }
        );
        let err = Credentials::from_secret(&secret(&[])).unwrap_err();
        assert!(matches!(err, CredentialError::MissingKey { key: "username", .. }));
    }
}
