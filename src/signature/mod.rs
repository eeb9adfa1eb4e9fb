/*!
 * Document signing and verification
 *
 * Signs the SHA-256 digest of a document with the custodied RSA private key
 * and verifies signatures against any RSA public key. The service holds no
 * mutable state and can be shared across threads.
 */

mod service;

pub use service::*;
