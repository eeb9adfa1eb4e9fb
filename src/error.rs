/*!
 * Error Handling for the Key Custody Module
 *
 * Provides the error taxonomy shared by key custody and signing: storage
 * failures, cryptographic failures and configuration failures, each with a
 * numeric error code, a caller-safe message and a fault classification for
 * whatever transport layer sits in front of the core.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Error type for all key custody and signing operations
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("Storage operation failed: {operation} at {location} - {cause}")]
    StorageError {
        operation: String,
        location: String,
        cause: String,
        error_code: u32,
    },

    #[error("Cryptographic operation failed: {operation} - {cause}")]
    CryptoError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Invalid configuration: {setting} - {cause}")]
    ConfigurationError {
        setting: String,
        cause: String,
        error_code: u32,
    },
}

/// Who is responsible for a failure, from the point of view of a request
/// handler calling into the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The caller supplied malformed input (signature, public key, encoding)
    Client,
    /// The server's key store, configuration or crypto backend failed
    Server,
}

/// Error code constants for different error categories
pub mod error_codes {
    // Storage errors: 1000-1999
    pub const STORAGE_CREATE_LOCATION_FAILED: u32 = 1001;
    pub const STORAGE_READ_FAILED: u32 = 1002;
    pub const STORAGE_WRITE_FAILED: u32 = 1003;
    pub const STORAGE_IO_FAILED: u32 = 1005;

    // Crypto errors: 2000-2999
    pub const KEY_GENERATION_FAILED: u32 = 2001;
    pub const KEY_ENCODING_FAILED: u32 = 2002;
    pub const KEY_DECODING_FAILED: u32 = 2003;
    pub const KEY_PAIR_MISMATCH: u32 = 2004;
    pub const BLOB_MALFORMED: u32 = 2010;
    pub const ENCRYPTION_FAILED: u32 = 2011;
    pub const DECRYPTION_FAILED: u32 = 2012;
    pub const SIGNING_FAILED: u32 = 2020;
    pub const SIGNATURE_MALFORMED: u32 = 2021;
    pub const PUBLIC_KEY_MALFORMED: u32 = 2022;

    // Configuration errors: 3000-3999
    pub const INVALID_SECRET: u32 = 3001;
    pub const FALLBACK_SECRET_REFUSED: u32 = 3002;
    pub const INVALID_IV_LENGTH: u32 = 3003;
    pub const INVALID_KEY_SIZE: u32 = 3004;
    pub const UNKNOWN_CIPHER_MODE: u32 = 3005;
    pub const UNKNOWN_SIGNATURE_SCHEME: u32 = 3006;
    pub const INVALID_KEY_FILE_NAME: u32 = 3007;
}

impl CustodyError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            CustodyError::StorageError { error_code, .. } => *error_code,
            CustodyError::CryptoError { error_code, .. } => *error_code,
            CustodyError::ConfigurationError { error_code, .. } => *error_code,
        }
    }

    /// Get the error category as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CustodyError::StorageError { .. } => "StorageError",
            CustodyError::CryptoError { .. } => "CryptoError",
            CustodyError::ConfigurationError { .. } => "ConfigurationError",
        }
    }

    /// Classify the error as caller-caused or server-caused.
    ///
    /// Only malformed caller input to the verification path is a client
    /// fault. A broken key store or failed decryption is always the server's.
    pub fn fault(&self) -> Fault {
        match self {
            CustodyError::CryptoError { error_code, .. } => match *error_code {
                error_codes::SIGNATURE_MALFORMED | error_codes::PUBLIC_KEY_MALFORMED => {
                    Fault::Client
                }
                _ => Fault::Server,
            },
            _ => Fault::Server,
        }
    }

    /// Get a message that is safe to return to a remote caller.
    ///
    /// Never includes the cause, the storage location or any key material.
    pub fn user_friendly_message(&self) -> String {
        match self.fault() {
            Fault::Client => match self.error_code() {
                error_codes::SIGNATURE_MALFORMED => "The supplied signature is malformed.".to_string(),
                _ => "The supplied public key is malformed.".to_string(),
            },
            Fault::Server => "The signing service is unavailable.".to_string(),
        }
    }

    /// Get technical details for operator-side debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());

        match self {
            CustodyError::StorageError {
                operation,
                location,
                cause,
                ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("location".to_string(), location.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            CustodyError::CryptoError {
                operation, cause, ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            CustodyError::ConfigurationError { setting, cause, .. } => {
                details.insert("setting".to_string(), setting.clone());
                details.insert("cause".to_string(), cause.clone());
            }
        }

        details
    }

    /// Get suggested remediation steps
    pub fn suggested_remediation(&self) -> Option<String> {
        match self.error_code() {
            error_codes::STORAGE_CREATE_LOCATION_FAILED | error_codes::STORAGE_WRITE_FAILED => Some(
                "Check that the keys directory is writable by the service user.".to_string(),
            ),
            error_codes::STORAGE_READ_FAILED => {
                Some("Check that both key files exist and are readable.".to_string())
            }
            error_codes::DECRYPTION_FAILED | error_codes::BLOB_MALFORMED => Some(
                "Verify ENCRYPTION_SECRET and BLOB_CIPHER match the values used when the keys were generated. Do not delete the key files: previously issued signatures depend on them."
                    .to_string(),
            ),
            error_codes::KEY_PAIR_MISMATCH => Some(
                "The persisted private and public key files do not belong together. Restore both from the same backup."
                    .to_string(),
            ),
            error_codes::FALLBACK_SECRET_REFUSED | error_codes::INVALID_SECRET => Some(
                "Set ENCRYPTION_SECRET to 32 random bytes (or 64 hex characters).".to_string(),
            ),
            error_codes::INVALID_KEY_FILE_NAME => Some(
                "Set PRIVATE_KEY_FILE and PUBLIC_KEY_FILE to two different plain file names inside KEYS_DIRECTORY."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Convenience constructors for common error types
impl CustodyError {
    pub fn storage_error(operation: &str, location: &str, cause: &str, error_code: u32) -> Self {
        CustodyError::StorageError {
            operation: operation.to_string(),
            location: location.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn crypto_error(operation: &str, cause: &str, error_code: u32) -> Self {
        CustodyError::CryptoError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn configuration_error(setting: &str, cause: &str, error_code: u32) -> Self {
        CustodyError::ConfigurationError {
            setting: setting.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, CustodyError::StorageError { .. })
    }

    pub fn is_crypto_error(&self) -> bool {
        matches!(self, CustodyError::CryptoError { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, CustodyError::ConfigurationError { .. })
    }
}

impl From<std::io::Error> for CustodyError {
    fn from(err: std::io::Error) -> Self {
        CustodyError::storage_error(
            "io",
            "unknown",
            &err.to_string(),
            error_codes::STORAGE_IO_FAILED,
        )
    }
}

/// Result type alias for custody operations
pub type CustodyResult<T> = Result<T, CustodyError>;
