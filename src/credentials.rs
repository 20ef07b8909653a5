//! Encrypted storage of the remote account credentials.
//!
//! The record is serialised to JSON and sealed with AES-256-GCM under a key
//! generated on first use. On disk the file holds `nonce || ciphertext`.

use std::{
    fmt, fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use log::{debug, info};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{helper, MerlionError, Result};

pub const APP_DIR_NAME: &str = "merlion";
const KEY_FILE: &str = ".key";
const CREDENTIALS_FILE: &str = "credentials.json";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Remote account login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(MerlionError::MissingCredentials {
                message: "email and password are required".to_string(),
            });
        }
        Ok(())
    }
}

// Never print the password, even in debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Owner-only directory holding the key and the sealed credentials.
pub struct CredentialStore {
    dir: PathBuf,
    key: [u8; KEY_LEN],
}

impl CredentialStore {
    /// Opens the store under `<config dir>/merlion`.
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| MerlionError::ConfigError {
            message: "could not determine the user config directory".to_string(),
        })?;
        Self::with_dir(base.join(APP_DIR_NAME))
    }

    /// Opens the store in `dir`, generating the key if there is none yet.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        helper::ensure_dir(&dir, 0o700)?;
        let key = load_or_generate_key(&dir.join(KEY_FILE))?;
        Ok(Self { dir, key })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        credentials.validate()?;
        let mut plain = serde_json::to_vec(credentials)?;
        let sealed = self.encrypt(&plain);
        plain.zeroize();

        helper::atomic_write(&self.credentials_path(), &sealed?, 0o600)?;
        info!("Saved credentials");
        Ok(())
    }

    /// Returns `None` when nothing has been saved.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let sealed = match fs::read(self.credentials_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("No saved credentials");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut plain = self.decrypt(&sealed)?;
        let parsed = serde_json::from_slice::<Credentials>(&plain);
        plain.zeroize();
        Ok(Some(parsed?))
    }

    /// Deletes the saved credentials; succeeds if there were none.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(self.credentials_path()) {
            Ok(()) => {
                info!("Removed saved credentials");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| MerlionError::CredentialStore {
            message: format!("invalid key: {}", e),
        })
    }

    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plain)
            .map_err(|_| MerlionError::CredentialStore {
                message: "encryption failed".to_string(),
            })?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(MerlionError::CredentialStore {
                message: "encrypted data too short".to_string(),
            });
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| MerlionError::CredentialStore {
                message: "decryption failed".to_string(),
            })
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn load_or_generate_key(path: &Path) -> Result<[u8; KEY_LEN]> {
    match fs::read(path) {
        Ok(bytes) => {
            let len = bytes.len();
            <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
                MerlionError::CredentialStore {
                    message: format!(
                        "key file {} has {} bytes, expected {}",
                        path.display(),
                        len,
                        KEY_LEN
                    ),
                }
            })
        }
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            let mut key = [0u8; KEY_LEN];
            rand::thread_rng().fill_bytes(&mut key);
            helper::atomic_write(path, &key, 0o600)?;
            info!("Generated new credential key at {}", path.display());
            Ok(key)
        }
        Err(e) => Err(e.into()),
    }
}
