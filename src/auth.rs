//! Upload signing for the blob store.
//!
//! The blob store accepts writes only from known keys. Each upload carries
//! the operator's Ed25519 public key, a Unix timestamp and a signature over
//! `"{timestamp}:UPLOAD"`. The secret key lives next to the gallery database.

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signer, SigningKey, SECRET_KEY_LENGTH};
use thiserror::Error;

/// Header carrying the public key.
pub const PUBKEY_HEADER: &str = "X-Pubkey";
/// Header carrying the signing timestamp.
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
/// Header carrying the hex signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

const KEY_FILE_NAME: &str = "upload.key";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No upload key found at {0}. Run 'zarvault init' first.")]
    NoKey(PathBuf),

    #[error("Invalid upload key file: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    #[error("Upload key already exists at {0}. Delete it first to regenerate.")]
    KeyExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Headers for one signed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCredentials {
    /// "ed25519p/{hex}".
    pub pubkey: String,
    pub timestamp: u64,
    /// Hex signature over "{timestamp}:UPLOAD".
    pub signature: String,
}

impl UploadCredentials {
    /// Attach the credentials to an outgoing request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(PUBKEY_HEADER, &self.pubkey)
            .header(TIMESTAMP_HEADER, self.timestamp.to_string())
            .header(SIGNATURE_HEADER, &self.signature)
    }
}

/// Operator key used to sign blob uploads.
#[derive(Clone)]
pub struct UploadKey {
    signing_key: SigningKey,
}

impl UploadKey {
    /// Load an existing key.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::NoKey(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let secret: [u8; SECRET_KEY_LENGTH] =
            bytes.as_slice().try_into().map_err(|_| AuthError::InvalidKey {
                expected: SECRET_KEY_LENGTH,
                actual: bytes.len(),
            })?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Load the key if one has been created, `None` otherwise.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, AuthError> {
        match Self::load(path) {
            Ok(key) => Ok(Some(key)),
            Err(AuthError::NoKey(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Generate and persist a new key. Refuses to overwrite.
    pub fn init(path: &Path) -> Result<Self, AuthError> {
        if path.exists() {
            return Err(AuthError::KeyExists(path.to_path_buf()));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        fs::write(path, signing_key.to_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self { signing_key })
    }

    /// Public key in "ed25519p/{hex}" form.
    pub fn public_key(&self) -> String {
        format!(
            "ed25519p/{}",
            hex::encode(self.signing_key.verifying_key().to_bytes())
        )
    }

    /// Sign an upload at the current time.
    pub fn credentials(&self) -> UploadCredentials {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.credentials_at(timestamp)
    }

    fn credentials_at(&self, timestamp: u64) -> UploadCredentials {
        let message = format!("{timestamp}:UPLOAD");
        let signature = self.signing_key.sign(message.as_bytes());

        UploadCredentials {
            pubkey: self.public_key(),
            timestamp,
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

impl std::fmt::Debug for UploadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadKey")
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Location of the upload key within a data directory.
pub fn key_path(data_dir: &Path) -> PathBuf {
    data_dir.join(KEY_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};
    use tempfile::TempDir;

    #[test]
    fn test_init_then_load_gives_same_key() {
        let temp = TempDir::new().unwrap();
        let path = key_path(temp.path());

        let created = UploadKey::init(&path).unwrap();
        let loaded = UploadKey::load(&path).unwrap();

        assert_eq!(created.public_key(), loaded.public_key());
        assert!(created.public_key().starts_with("ed25519p/"));
    }

    #[test]
    fn test_signature_verifies_over_upload_message() {
        let temp = TempDir::new().unwrap();
        let key = UploadKey::init(&key_path(temp.path())).unwrap();

        let creds = key.credentials_at(1_700_000_000);
        assert_eq!(creds.signature.len(), 128);

        let sig_bytes: [u8; 64] = hex::decode(&creds.signature).unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&sig_bytes);
        key.signing_key
            .verifying_key()
            .verify(b"1700000000:UPLOAD", &signature)
            .unwrap();
    }

    #[test]
    fn test_missing_key_is_optional() {
        let temp = TempDir::new().unwrap();
        let path = key_path(temp.path());

        assert!(matches!(UploadKey::load(&path), Err(AuthError::NoKey(_))));
        assert!(UploadKey::load_optional(&path).unwrap().is_none());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = key_path(temp.path());

        UploadKey::init(&path).unwrap();
        assert!(matches!(UploadKey::init(&path), Err(AuthError::KeyExists(_))));
    }

    #[test]
    fn test_truncated_key_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = key_path(temp.path());
        fs::write(&path, [0u8; 7]).unwrap();

        assert!(matches!(
            UploadKey::load(&path),
            Err(AuthError::InvalidKey { expected: 32, actual: 7 })
        ));
    }
}
