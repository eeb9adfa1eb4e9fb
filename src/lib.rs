/*!
 * Key Custody and Document Signing
 *
 * This crate keeps a single RSA signing keypair for a service and signs and
 * verifies documents with it.
 *
 * - `key_management` generates the keypair once, stores each half encrypted
 *   at rest and decrypts it on every start
 * - `blob` implements the at-rest format, `hex(iv) + ":" + hex(ciphertext)`
 *   under AES-256
 * - `signature` signs SHA-256 document digests with RSA and verifies them
 *
 * Startup is two-phase: build a `KeyCustodian` and call `initialize` once,
 * then hand the resulting keypair to a `SignatureService` that serves
 * requests without touching storage.
 */

/// At-rest encryption of key material
pub mod blob;

/// Startup configuration
pub mod config;

/// Error types for custody and signing
pub mod error;

/// Keypair lifecycle and storage
pub mod key_management;

/// Zeroizing containers for sensitive bytes
pub mod secure_memory;

/// Document signing and verification
pub mod signature;

pub use blob::{CipherMode, EncryptedBlob, EncryptionSecret};
pub use config::CustodyConfig;
pub use error::{CustodyError, CustodyResult, Fault};
pub use key_management::{CustodianState, KeyCustodian, KeyPair};
pub use signature::{Signature, SignatureScheme, SignatureService};

/// Run the startup phase described by `config` and return a ready signer.
///
/// Generates and persists the keypair on first run; on later runs decrypts
/// the persisted keypair. Any failure here should abort process start.
///
/// # Example
///
/// ```no_run
/// use keycustody::{bootstrap, CustodyConfig};
///
/// fn main() -> Result<(), keycustody::CustodyError> {
///     let config = CustodyConfig::from_env()?;
///     let signer = bootstrap(&config)?;
///
///     let signature = signer.sign(b"document")?;
///     assert!(signer.verify(b"document", &signature)?);
///     Ok(())
/// }
/// ```
pub fn bootstrap(config: &CustodyConfig) -> CustodyResult<SignatureService> {
    let custodian = KeyCustodian::from_config(config);
    let keypair = custodian.initialize()?;
    SignatureService::with_scheme(keypair, config.signature_scheme)
}

pub mod prelude {
    pub use crate::blob::{decrypt, encrypt, CipherMode, EncryptedBlob, EncryptionSecret};
    pub use crate::bootstrap;
    pub use crate::config::CustodyConfig;
    pub use crate::error::{CustodyError, CustodyResult, Fault};
    pub use crate::key_management::{
        ensure_key_pair, CustodianState, FileSystemStorage, KeyCustodian, KeyPair, KeyStorage,
        MemoryStorage,
    };
    pub use crate::signature::{sign, verify, Signature, SignatureScheme, SignatureService};
}
