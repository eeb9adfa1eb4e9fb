/*!
 * At-rest encryption for persisted key material
 *
 * Key halves are stored as `hex(iv) + ":" + hex(ciphertext)` text, encrypted
 * under a single process-wide AES-256 secret. AES-256-CBC with PKCS#7
 * padding is the default mode; AES-256-GCM with a 16-byte nonce is available
 * for deployments that want tamper detection on the persisted files.
 */

mod encrypted_blob;
mod secret;

pub use encrypted_blob::*;
pub use secret::*;
