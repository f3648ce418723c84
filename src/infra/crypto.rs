use std::path::Path;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Symmetric vault for credentials that must be recoverable at provisioning
/// time. Tokens are base64(nonce || ciphertext) with a random nonce, so two
/// encryptions of the same plaintext never compare equal.
#[derive(Clone)]
pub struct SecretVault {
    key: aes_gcm::Key<Aes256Gcm>,
}

impl SecretVault {
    /// Key resolution order: `VAULT_KEY` from the environment, then the key
    /// file at `path`. The file and its parent directory are created with a
    /// freshly generated key on first use.
    pub fn from_env_or_file(path: &Path) -> Result<Self, InfraError> {
        if let Ok(key_b64) = std::env::var("VAULT_KEY") {
            return Self::new_from_base64(&key_b64).map_err(InfraError::VaultInit);
        }
        Self::from_key_file(path)
    }

    pub fn from_key_file(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(InfraError::VaultKeyFile)?;
            }
            let fresh: [u8; KEY_LEN] = rand::random();
            std::fs::write(path, general_purpose::STANDARD.encode(fresh))
                .map_err(InfraError::VaultKeyFile)?;
        }
        let key_b64 = std::fs::read_to_string(path).map_err(InfraError::VaultKeyFile)?;
        Self::new_from_base64(key_b64.trim()).map_err(InfraError::VaultInit)
    }

    pub fn new_from_base64(key_b64: &str) -> AppResult<Self> {
        let raw = general_purpose::STANDARD
            .decode(key_b64.as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid vault key: {e}")))?;
        if raw.len() != KEY_LEN {
            return Err(AppError::Internal(
                "Vault key must decode to 32 bytes".into(),
            ));
        }
        let mut key_bytes = [0u8; KEY_LEN];
        key_bytes.copy_from_slice(&raw);
        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self { key: *key })
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce_bytes = rand::random::<[u8; NONCE_LEN]>();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut buffer = Vec::with_capacity(NONCE_LEN + plaintext.len() + 16);
        buffer.extend_from_slice(nonce);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Internal(format!("encrypt failed: {e}")))?;
        buffer.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(buffer))
    }

    /// Fails with `AppError::Crypto` for tokens produced under a different
    /// key and for malformed input. Callers that need the secret for
    /// provisioning must surface this, never skip it.
    pub fn decrypt(&self, token: &str) -> AppResult<String> {
        let data = general_purpose::STANDARD
            .decode(token.as_bytes())
            .map_err(|_| AppError::Crypto)?;
        if data.len() <= NONCE_LEN {
            return Err(AppError::Crypto);
        }
        let (nonce_bytes, cipher_bytes) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(nonce, cipher_bytes)
            .map_err(|_| AppError::Crypto)?;
        String::from_utf8(plaintext).map_err(|_| AppError::Crypto)
    }
}
