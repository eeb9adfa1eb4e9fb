/*!
 * Key Management System for the signing keypair
 *
 * This module owns the lifecycle of the single RSA keypair: generation,
 * encryption of each half at rest, persistence, and decryption on every
 * process start.
 */

pub mod custodian;
pub mod keypair;
pub mod storage;

#[cfg(test)]
mod tests;

pub use custodian::ensure_key_pair;
pub use custodian::CustodianState;
pub use custodian::KeyCustodian;
pub use keypair::parse_private_key_pem;
pub use keypair::parse_public_key_pem;
pub use keypair::KeyPair;
pub use keypair::MIN_KEY_BITS;
pub use keypair::PRIVATE_KEY_PEM_HEADER;
pub use keypair::PUBLIC_KEY_PEM_HEADER;
pub use storage::FileSystemStorage;
pub use storage::KeyStorage;
pub use storage::MemoryStorage;
