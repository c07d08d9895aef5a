//! Ed25519 signing keys for local access tokens.

use crate::error::TokenError;
use biscuit_auth::{Algorithm, KeyPair as BiscuitKeyPair, PrivateKey, PublicKey};
use rand::RngCore;
use std::path::Path;

/// The process signing key. Tokens minted under one key do not verify under another.
pub struct KeyPair {
    inner: BiscuitKeyPair,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Result<Self, TokenError> {
        let mut rng = rand::rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);

        let private_key = PrivateKey::from_bytes(&bytes, Algorithm::Ed25519)
            .map_err(|e| TokenError::KeyGenerationFailed(e.to_string()))?;
        Ok(Self::from_private_key(private_key))
    }

    pub fn from_private_key(private_key: PrivateKey) -> Self {
        Self {
            inner: BiscuitKeyPair::from(&private_key),
        }
    }

    /// Load a keypair from a hex-encoded private key string.
    pub fn from_private_key_hex(hex: &str) -> Result<Self, TokenError> {
        let private_key = PrivateKey::from_bytes_hex(hex.trim(), Algorithm::Ed25519)
            .map_err(|e| TokenError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_private_key(private_key))
    }

    /// Load a keypair from a private key file.
    pub fn load_from_file(private_key_path: &Path) -> Result<Self, TokenError> {
        let hex = std::fs::read_to_string(private_key_path)?;
        Self::from_private_key_hex(&hex)
    }

    /// Use the configured key if there is one, otherwise generate an ephemeral key.
    ///
    /// Tokens signed with an ephemeral key stop verifying when the process restarts.
    pub fn from_hex_or_generate(hex: Option<&str>) -> Result<Self, TokenError> {
        match hex {
            Some(hex) => Self::from_private_key_hex(hex),
            None => {
                tracing::warn!("no signing key configured; generating an ephemeral key");
                Self::generate()
            }
        }
    }

    pub(crate) fn inner(&self) -> &BiscuitKeyPair {
        &self.inner
    }

    pub fn public_key(&self) -> PublicKey {
        self.inner.public()
    }

    pub fn private_key_hex(&self) -> String {
        self.inner.private().to_bytes_hex()
    }

    pub fn public_key_hex(&self) -> String {
        self.inner.public().to_bytes_hex()
    }

    /// Write the private key as hex.
    pub fn save_to_file(&self, private_key_path: &Path) -> Result<(), TokenError> {
        std::fs::write(private_key_path, self.private_key_hex())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate().unwrap();
        assert!(!keypair.private_key_hex().is_empty());
        assert_ne!(
            keypair.public_key_hex(),
            KeyPair::generate().unwrap().public_key_hex()
        );
    }

    #[test]
    fn test_keypair_hex_roundtrip() {
        let keypair = KeyPair::generate().unwrap();
        let restored = KeyPair::from_private_key_hex(&keypair.private_key_hex()).unwrap();
        assert_eq!(keypair.public_key_hex(), restored.public_key_hex());
    }

    #[test]
    fn test_keypair_file_save_load() {
        let keypair = KeyPair::generate().unwrap();
        let file = NamedTempFile::new().unwrap();

        keypair.save_to_file(file.path()).unwrap();
        let loaded = KeyPair::load_from_file(file.path()).unwrap();
        assert_eq!(keypair.public_key_hex(), loaded.public_key_hex());
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(matches!(
            KeyPair::from_private_key_hex("not-a-key"),
            Err(TokenError::InvalidPrivateKey(_))
        ));
    }
}
