//! Sealed storage for saved card details.
//!
//! Card details are serialised to JSON and encrypted with AES-256-GCM before
//! they reach the database. The stored form is base64 of `nonce || ciphertext`.
//! Only the network and last four digits are kept in the clear.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::models::CardDetails;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Errors sealing or opening card details.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("payment method key must be {KEY_LEN} bytes of base64")]
    InvalidKey,

    #[error("failed to encrypt card details")]
    Seal,

    #[error("stored card details are corrupt")]
    Corrupt,

    #[error("card details serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encrypts and decrypts [`CardDetails`].
#[derive(Clone)]
pub struct CardVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CardVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardVault").finish_non_exhaustive()
    }
}

impl CardVault {
    /// Build a vault from a base64-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidKey` if the key is not valid base64 or
    /// not exactly 32 bytes.
    pub fn from_base64_key(key: &SecretString) -> Result<Self, VaultError> {
        let bytes = STANDARD
            .decode(key.expose_secret().trim())
            .map_err(|_| VaultError::InvalidKey)?;
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey);
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt card details for storage.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Seal` if encryption fails.
    pub fn seal(&self, details: &CardDetails) -> Result<String, VaultError> {
        let plaintext = serde_json::to_vec(details)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| VaultError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt stored card details.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Corrupt` if the value was not sealed with this
    /// key or has been tampered with.
    pub fn open(&self, sealed: &str) -> Result<CardDetails, VaultError> {
        let raw = STANDARD.decode(sealed).map_err(|_| VaultError::Corrupt)?;
        let (nonce, ciphertext) = raw
            .split_at_checked(NONCE_LEN)
            .ok_or(VaultError::Corrupt)?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Corrupt)?;
        serde_json::from_slice(&plaintext).map_err(|_| VaultError::Corrupt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn vault(byte: u8) -> CardVault {
        let key = SecretString::from(STANDARD.encode([byte; KEY_LEN]));
        CardVault::from_base64_key(&key).unwrap()
    }

    fn details() -> CardDetails {
        CardDetails {
            gateway_token: "token_Abc123".to_owned(),
            expiry_month: 4,
            expiry_year: 2030,
            holder_name: "Asha Rao".to_owned(),
        }
    }

    #[test]
    fn test_seal_then_open() {
        let vault = vault(7);
        let sealed = vault.seal(&details()).unwrap();
        assert!(!sealed.contains("token_Abc123"));

        let opened = vault.open(&sealed).unwrap();
        assert_eq!(opened.gateway_token, "token_Abc123");
        assert_eq!(opened.expiry_year, 2030);
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let vault = vault(7);
        assert_ne!(vault.seal(&details()).unwrap(), vault.seal(&details()).unwrap());
    }

    #[test]
    fn test_wrong_key_is_corrupt() {
        let sealed = vault(7).seal(&details()).unwrap();
        assert!(matches!(vault(8).open(&sealed), Err(VaultError::Corrupt)));
    }

    #[test]
    fn test_truncated_value_is_corrupt() {
        let vault = vault(7);
        assert!(matches!(vault.open("AAAA"), Err(VaultError::Corrupt)));
        assert!(matches!(vault.open("not base64!"), Err(VaultError::Corrupt)));
    }

    #[test]
    fn test_rejects_short_key() {
        let key = SecretString::from(STANDARD.encode([1_u8; 16]));
        assert!(matches!(
            CardVault::from_base64_key(&key),
            Err(VaultError::InvalidKey)
        ));
    }
}
