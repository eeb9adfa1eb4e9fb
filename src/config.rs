//! Startup configuration for key custody and signing.
//!
//! Values come from environment-style variables. Everything except the
//! encryption secret has a default; the secret falls back to a compiled-in
//! development value unless the deployment declares itself production.

use std::fmt;
use std::path::PathBuf;

use crate::blob::{CipherMode, EncryptionSecret, IV_LENGTH};
use crate::error::{error_codes, CustodyError, CustodyResult};
use crate::key_management::MIN_KEY_BITS;
use crate::signature::SignatureScheme;

pub const ENV_ENCRYPTION_SECRET: &str = "ENCRYPTION_SECRET";
pub const ENV_IV_LENGTH: &str = "IV_LENGTH";
pub const ENV_KEYS_DIRECTORY: &str = "KEYS_DIRECTORY";
pub const ENV_PRIVATE_KEY_FILE: &str = "PRIVATE_KEY_FILE";
pub const ENV_PUBLIC_KEY_FILE: &str = "PUBLIC_KEY_FILE";
pub const ENV_BLOB_CIPHER: &str = "BLOB_CIPHER";
pub const ENV_SIGNATURE_SCHEME: &str = "SIGNATURE_SCHEME";
pub const ENV_KEY_BITS: &str = "KEY_BITS";
pub const ENV_CUSTODY_ENV: &str = "CUSTODY_ENV";
pub const ENV_APP_ENV: &str = "APP_ENV";

pub const DEFAULT_KEYS_DIRECTORY: &str = "keys";
pub const DEFAULT_PRIVATE_KEY_FILE: &str = "private.pem.enc";
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "public.pem.enc";
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Deployment environment, as declared by `CUSTODY_ENV` or `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Resolved configuration for a `KeyCustodian` and `SignatureService`
#[derive(Clone)]
pub struct CustodyConfig {
    pub secret: EncryptionSecret,
    pub keys_directory: PathBuf,
    pub private_key_file: String,
    pub public_key_file: String,
    pub cipher_mode: CipherMode,
    pub signature_scheme: SignatureScheme,
    pub key_bits: usize,
    pub environment: Environment,
}

impl CustodyConfig {
    /// Development defaults with the given secret
    pub fn new(secret: EncryptionSecret) -> Self {
        Self {
            secret,
            keys_directory: PathBuf::from(DEFAULT_KEYS_DIRECTORY),
            private_key_file: DEFAULT_PRIVATE_KEY_FILE.to_string(),
            public_key_file: DEFAULT_PUBLIC_KEY_FILE.to_string(),
            cipher_mode: CipherMode::default(),
            signature_scheme: SignatureScheme::default(),
            key_bits: DEFAULT_KEY_BITS,
            environment: Environment::Development,
        }
    }

    /// Builder-style override of the keys directory
    pub fn with_keys_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keys_directory = dir.into();
        self
    }

    /// Load from the process environment
    pub fn from_env() -> CustodyResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> CustodyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(
            get(ENV_CUSTODY_ENV)
                .or_else(|| get(ENV_APP_ENV))
                .as_deref(),
        );

        let secret = match get(ENV_ENCRYPTION_SECRET) {
            Some(value) => EncryptionSecret::from_config_value(&value)?,
            None => {
                if environment == Environment::Production {
                    return Err(CustodyError::configuration_error(
                        ENV_ENCRYPTION_SECRET,
                        "not set; the development fallback is refused in production",
                        error_codes::FALLBACK_SECRET_REFUSED,
                    ));
                }
                log::warn!(
                    "{} is not set; using the compiled-in development secret. Key files written now are NOT protected.",
                    ENV_ENCRYPTION_SECRET
                );
                EncryptionSecret::development_fallback()
            }
        };

        if environment == Environment::Production && secret.is_development_fallback() {
            return Err(CustodyError::configuration_error(
                ENV_ENCRYPTION_SECRET,
                "equals the development fallback; refused in production",
                error_codes::FALLBACK_SECRET_REFUSED,
            ));
        }

        if let Some(value) = get(ENV_IV_LENGTH) {
            let iv_length: usize = value.trim().parse().map_err(|_| {
                CustodyError::configuration_error(
                    ENV_IV_LENGTH,
                    &format!("'{}' is not a number", value),
                    error_codes::INVALID_IV_LENGTH,
                )
            })?;
            if iv_length != IV_LENGTH {
                return Err(CustodyError::configuration_error(
                    ENV_IV_LENGTH,
                    &format!("only {} is supported, got {}", IV_LENGTH, iv_length),
                    error_codes::INVALID_IV_LENGTH,
                ));
            }
        }

        let key_bits = match get(ENV_KEY_BITS) {
            Some(value) => value.trim().parse::<usize>().map_err(|_| {
                CustodyError::configuration_error(
                    ENV_KEY_BITS,
                    &format!("'{}' is not a number", value),
                    error_codes::INVALID_KEY_SIZE,
                )
            })?,
            None => DEFAULT_KEY_BITS,
        };
        if key_bits < MIN_KEY_BITS {
            return Err(CustodyError::configuration_error(
                ENV_KEY_BITS,
                &format!("must be at least {}, got {}", MIN_KEY_BITS, key_bits),
                error_codes::INVALID_KEY_SIZE,
            ));
        }

        let cipher_mode = match get(ENV_BLOB_CIPHER) {
            Some(value) => value.parse()?,
            None => CipherMode::default(),
        };
        if !cipher_mode.is_authenticated() {
            log::debug!("Key files use {} without integrity protection", cipher_mode);
        }

        let signature_scheme = match get(ENV_SIGNATURE_SCHEME) {
            Some(value) => value.parse()?,
            None => SignatureScheme::default(),
        };

        let private_key_file =
            get(ENV_PRIVATE_KEY_FILE).unwrap_or_else(|| DEFAULT_PRIVATE_KEY_FILE.to_string());
        let public_key_file =
            get(ENV_PUBLIC_KEY_FILE).unwrap_or_else(|| DEFAULT_PUBLIC_KEY_FILE.to_string());
        if private_key_file == public_key_file {
            return Err(CustodyError::configuration_error(
                ENV_PRIVATE_KEY_FILE,
                &format!("'{}' is also {}", private_key_file, ENV_PUBLIC_KEY_FILE),
                error_codes::INVALID_KEY_FILE_NAME,
            ));
        }

        Ok(Self {
            secret,
            keys_directory: get(ENV_KEYS_DIRECTORY)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYS_DIRECTORY)),
            private_key_file,
            public_key_file,
            cipher_mode,
            signature_scheme,
            key_bits,
            environment,
        })
    }
}

impl fmt::Debug for CustodyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodyConfig")
            .field("secret", &self.secret)
            .field("keys_directory", &self.keys_directory)
            .field("private_key_file", &self.private_key_file)
            .field("public_key_file", &self.public_key_file)
            .field("cipher_mode", &self.cipher_mode)
            .field("signature_scheme", &self.signature_scheme)
            .field("key_bits", &self.key_bits)
            .field("environment", &self.environment)
            .finish()
    }
}
