//! In-process token vault.
//!
//! Ciphertexts live in a process-local map. Suitable for tests and single-node
//! deployments; a production vault sits behind an HSM or managed secret store.

use std::collections::HashMap;
use std::sync::RwLock;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::VaultError;
use crate::key::VaultKey;
use crate::vault::TokenVault;

const NONCE_LEN: usize = 12;
const PAN_PREFIX: &str = "tok_pan_";
const CVV_PREFIX: &str = "tok_cvv_";

/// AES-256-GCM vault. Each entry is `nonce ‖ ciphertext+tag`.
pub struct InMemoryTokenVault {
    cipher: Aes256Gcm,
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryTokenVault {
    pub fn new(key: &VaultKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self {
            cipher,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, prefix: &str, value: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, value.as_bytes())
            .map_err(|_| VaultError::Crypto("encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        let token = format!("{prefix}{}", Uuid::new_v4().simple());
        self.entries
            .write()
            .map_err(|_| VaultError::unavailable("vault lock poisoned"))?
            .insert(token.clone(), blob);

        debug!(token = %token, "vault entry stored");
        Ok(token)
    }
}

impl core::fmt::Debug for InMemoryTokenVault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryTokenVault")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenVault for InMemoryTokenVault {
    async fn store_pan(&self, pan: &str) -> Result<String, VaultError> {
        if pan.len() != 16 || !pan.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VaultError::invalid_argument("PAN must be exactly 16 digits"));
        }
        self.store(PAN_PREFIX, pan)
    }

    async fn store_cvv(&self, cvv: &str) -> Result<String, VaultError> {
        if !(3..=4).contains(&cvv.len()) || !cvv.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VaultError::invalid_argument("CVV must be 3 or 4 digits"));
        }
        self.store(CVV_PREFIX, cvv)
    }

    async fn retrieve(&self, token: &str) -> Result<String, VaultError> {
        let blob = self
            .entries
            .read()
            .map_err(|_| VaultError::unavailable("vault lock poisoned"))?
            .get(token)
            .cloned()
            .ok_or_else(|| VaultError::UnknownToken(token.to_string()))?;

        if blob.len() <= NONCE_LEN {
            return Err(VaultError::Crypto(format!("entry {token} is truncated")));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Crypto(format!("entry {token} failed authentication")))?;

        String::from_utf8(plaintext)
            .map_err(|_| VaultError::Crypto(format!("entry {token} is not utf-8")))
    }
}
