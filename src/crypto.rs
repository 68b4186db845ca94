//! At-rest encryption for stored email bodies.
//!
//! AES-256-GCM with a random 32-byte key kept in a file next to the
//! config. The nonce is prepended to the ciphertext and the whole blob is
//! base64-encoded for the TEXT column.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::path::Path;

use crate::error::JobError;

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;

pub struct BodyCipher {
    cipher: Aes256Gcm,
}

impl BodyCipher {
    /// Load the key at `path`, creating a fresh one (mode 0600) on first
    /// use.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path = path.as_ref();

        let key_bytes: [u8; 32] = if path.exists() {
            let data = fs::read(path)?;
            data.try_into()
                .map_err(|_| JobError::Config(format!("invalid key file: {}", path.display())))?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let key = Aes256Gcm::generate_key(OsRng);
            fs::write(path, key.as_slice())?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
            }
            key.into()
        };

        Ok(Self {
            cipher: Aes256Gcm::new(&key_bytes.into()),
        })
    }

    /// Encrypt to base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, JobError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| JobError::Other(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, JobError> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|e| JobError::Other(format!("invalid encrypted data: {}", e)))?;
        if blob.len() < NONCE_SIZE {
            return Err(JobError::Other("invalid encrypted data: too short".into()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| JobError::Other(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| JobError::Other(format!("invalid UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = BodyCipher::load_or_create(dir.path().join("key")).unwrap();

        let body = "Hi, we have a role that matches your background.";
        let encrypted = cipher.encrypt(body).unwrap();
        assert_ne!(encrypted, body);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), body);
    }

    #[test]
    fn key_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("key");

        let first = BodyCipher::load_or_create(&key_path).unwrap();
        let encrypted = first.encrypt("secret").unwrap();

        let second = BodyCipher::load_or_create(&key_path).unwrap();
        assert_eq!(second.decrypt(&encrypted).unwrap(), "secret");
    }

    #[test]
    fn tampered_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = BodyCipher::load_or_create(dir.path().join("key")).unwrap();

        assert!(cipher.decrypt("bm90IHZhbGlk").is_err());
        assert!(cipher.decrypt("!!!").is_err());
    }
}
