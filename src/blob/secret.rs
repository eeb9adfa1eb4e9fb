use std::fmt;

use crate::error::{error_codes, CustodyError, CustodyResult};
use crate::secure_memory::SecureBytes;

/// Length of the AES-256 key used for at-rest encryption
pub const SECRET_LENGTH: usize = 32;

/// Compiled-in secret used when `ENCRYPTION_SECRET` is not configured.
///
/// Anyone with the source can decrypt key files protected by it. Production
/// configurations refuse to start with it (see `CustodyConfig`).
const DEVELOPMENT_FALLBACK_SECRET: &[u8; SECRET_LENGTH] = b"development-only-secret-32-bytes";

/// Symmetric key protecting every persisted `EncryptedBlob`
///
/// # Examples
///
/// ```
/// use keycustody::blob::EncryptionSecret;
///
/// // 32 raw characters
/// let raw = EncryptionSecret::from_config_value("0123456789abcdef0123456789abcdef").unwrap();
///
/// // or 64 hex characters
/// let hexed = EncryptionSecret::from_config_value(&"ab".repeat(32)).unwrap();
/// assert_ne!(raw, hexed);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionSecret {
    key: SecureBytes,
}

impl EncryptionSecret {
    /// Use exactly 32 bytes as the AES-256 key
    pub fn from_bytes(bytes: &[u8]) -> CustodyResult<Self> {
        if bytes.len() != SECRET_LENGTH {
            return Err(CustodyError::configuration_error(
                "ENCRYPTION_SECRET",
                &format!(
                    "expected {} bytes, got {} bytes",
                    SECRET_LENGTH,
                    bytes.len()
                ),
                error_codes::INVALID_SECRET,
            ));
        }

        Ok(Self {
            key: SecureBytes::new(bytes),
        })
    }

    /// Parse a configured secret: 32 raw characters or 64 hex characters
    pub fn from_config_value(value: &str) -> CustodyResult<Self> {
        if value.len() == SECRET_LENGTH * 2 {
            let decoded = SecureBytes::from(hex::decode(value).map_err(|e| {
                CustodyError::configuration_error(
                    "ENCRYPTION_SECRET",
                    &format!("64-character secret is not valid hex: {}", e),
                    error_codes::INVALID_SECRET,
                )
            })?);
            return Self::from_bytes(decoded.as_bytes());
        }

        Self::from_bytes(value.as_bytes())
    }

    /// The compiled-in development secret
    pub fn development_fallback() -> Self {
        Self {
            key: SecureBytes::new(DEVELOPMENT_FALLBACK_SECRET),
        }
    }

    /// Whether this secret is the compiled-in development value
    pub fn is_development_fallback(&self) -> bool {
        self.key.ct_eq(DEVELOPMENT_FALLBACK_SECRET)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }
}

impl fmt::Debug for EncryptionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSecret")
            .field("key", &"[REDACTED]")
            .field("development_fallback", &self.is_development_fallback())
            .finish()
    }
}
