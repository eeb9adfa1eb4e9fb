// Load-or-create custody of the keypair

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use super::keypair::KeyPair;
use super::storage::{FileSystemStorage, KeyStorage};
use crate::blob::{decrypt_from_str, encrypt_to_string, CipherMode, EncryptionSecret};
use crate::config::{
    CustodyConfig, DEFAULT_KEY_BITS, DEFAULT_PRIVATE_KEY_FILE, DEFAULT_PUBLIC_KEY_FILE,
    ENV_PRIVATE_KEY_FILE,
};
use crate::error::{error_codes, CustodyError, CustodyResult};

/// Whether a storage location already holds a persisted keypair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodianState {
    /// At least one of the two key entries is missing
    Uninitialized,
    /// Both key entries are persisted
    Ready,
}

/// Guarantees a usable, decrypted keypair for the rest of the process
///
/// # Examples
///
/// ```no_run
/// use keycustody::blob::EncryptionSecret;
/// use keycustody::key_management::{FileSystemStorage, KeyCustodian};
///
/// let secret = EncryptionSecret::from_config_value("0123456789abcdef0123456789abcdef").unwrap();
/// let custodian = KeyCustodian::new(FileSystemStorage::new("keys"), secret);
///
/// // Startup phase: generate on first run, decrypt on every later run
/// let keypair = custodian.initialize().unwrap();
/// println!("signing key {}", keypair.fingerprint());
/// ```
pub struct KeyCustodian<S: KeyStorage> {
    storage: S,
    secret: EncryptionSecret,
    cipher_mode: CipherMode,
    key_bits: usize,
    private_key_file: String,
    public_key_file: String,
    ready: OnceLock<Arc<KeyPair>>,
    init_gate: Mutex<()>,
}

impl<S: KeyStorage> KeyCustodian<S> {
    /// Custody over `storage` with default file names, AES-256-CBC and
    /// 2048-bit keys
    pub fn new(storage: S, secret: EncryptionSecret) -> Self {
        Self {
            storage,
            secret,
            cipher_mode: CipherMode::default(),
            key_bits: DEFAULT_KEY_BITS,
            private_key_file: DEFAULT_PRIVATE_KEY_FILE.to_string(),
            public_key_file: DEFAULT_PUBLIC_KEY_FILE.to_string(),
            ready: OnceLock::new(),
            init_gate: Mutex::new(()),
        }
    }

    pub fn with_cipher_mode(mut self, cipher_mode: CipherMode) -> Self {
        self.cipher_mode = cipher_mode;
        self
    }

    pub fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    pub fn with_file_names(
        mut self,
        private_key_file: impl Into<String>,
        public_key_file: impl Into<String>,
    ) -> Self {
        self.private_key_file = private_key_file.into();
        self.public_key_file = public_key_file.into();
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn cipher_mode(&self) -> CipherMode {
        self.cipher_mode
    }

    /// Inspect persisted state without generating anything
    pub fn state(&self) -> CustodyResult<CustodianState> {
        if self.storage.exists(&self.private_key_file)?
            && self.storage.exists(&self.public_key_file)?
        {
            Ok(CustodianState::Ready)
        } else {
            Ok(CustodianState::Uninitialized)
        }
    }

    /// Load the persisted keypair, generating and persisting it first if
    /// either half is missing.
    ///
    /// Decryption failures are returned as errors; the keypair is never
    /// regenerated over entries that exist but cannot be read.
    pub fn ensure_key_pair(&self) -> CustodyResult<KeyPair> {
        if self.private_key_file == self.public_key_file {
            return Err(CustodyError::configuration_error(
                ENV_PRIVATE_KEY_FILE,
                &format!(
                    "'{}' is also the public key file; each half needs its own entry",
                    self.private_key_file
                ),
                error_codes::INVALID_KEY_FILE_NAME,
            ));
        }

        self.storage.ensure_location()?;

        let has_private = self.storage.exists(&self.private_key_file)?;
        let has_public = self.storage.exists(&self.public_key_file)?;

        if !has_private || !has_public {
            if has_private || has_public {
                log::warn!(
                    "Only one key file present in {}; generating a new keypair and replacing it",
                    self.storage.describe()
                );
            }
            self.generate_and_persist()?;
        }

        let private_blob = self.storage.read(&self.private_key_file)?;
        let public_blob = self.storage.read(&self.public_key_file)?;

        let private_pem = decrypt_from_str(self.cipher_mode, &private_blob, &self.secret)?;
        let public_pem = decrypt_from_str(self.cipher_mode, &public_blob, &self.secret)?;

        let keypair = KeyPair::from_pem(private_pem.as_bytes(), public_pem.as_bytes())?;
        log::info!(
            "Loaded signing keypair {} from {}",
            keypair.fingerprint(),
            self.storage.describe()
        );
        Ok(keypair)
    }

    /// One-time startup barrier around `ensure_key_pair`.
    ///
    /// The first caller generates or loads the keypair while concurrent
    /// callers wait; every call afterwards returns the same shared keypair
    /// without touching storage. A failed attempt leaves the custodian
    /// uninitialized.
    pub fn initialize(&self) -> CustodyResult<Arc<KeyPair>> {
        if let Some(keypair) = self.ready.get() {
            return Ok(Arc::clone(keypair));
        }

        let _gate = self.init_gate.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(keypair) = self.ready.get() {
            return Ok(Arc::clone(keypair));
        }

        let keypair = Arc::new(self.ensure_key_pair()?);
        // Only the gate holder sets the cell, so this cannot already be full.
        let _ = self.ready.set(Arc::clone(&keypair));
        Ok(keypair)
    }

    /// The keypair, if `initialize` has completed
    pub fn key_pair(&self) -> Option<Arc<KeyPair>> {
        self.ready.get().cloned()
    }

    fn generate_and_persist(&self) -> CustodyResult<()> {
        log::info!(
            "Generating {}-bit RSA signing keypair in {}",
            self.key_bits,
            self.storage.describe()
        );
        let keypair = KeyPair::generate(self.key_bits)?;

        let private_blob =
            encrypt_to_string(self.cipher_mode, keypair.private_key_pem(), &self.secret)?;
        let public_blob = encrypt_to_string(
            self.cipher_mode,
            keypair.public_key_pem().as_bytes(),
            &self.secret,
        )?;

        self.storage.write(&self.private_key_file, &private_blob)?;
        self.storage.write(&self.public_key_file, &public_blob)?;

        log::info!(
            "Persisted encrypted keypair {} ({})",
            keypair.fingerprint(),
            self.cipher_mode
        );
        Ok(())
    }
}

impl KeyCustodian<FileSystemStorage> {
    /// Filesystem custody as described by `config`
    pub fn from_config(config: &CustodyConfig) -> Self {
        KeyCustodian::new(
            FileSystemStorage::new(&config.keys_directory),
            config.secret.clone(),
        )
        .with_cipher_mode(config.cipher_mode)
        .with_key_bits(config.key_bits)
        .with_file_names(&config.private_key_file, &config.public_key_file)
    }
}

/// Load or create the keypair in `location` with default file names and
/// AES-256-CBC
pub fn ensure_key_pair(
    location: impl AsRef<Path>,
    secret: &EncryptionSecret,
) -> CustodyResult<KeyPair> {
    KeyCustodian::new(FileSystemStorage::new(location.as_ref()), secret.clone()).ensure_key_pair()
}
