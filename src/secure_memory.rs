//! Secure Memory Handling Utilities
//!
//! Containers for sensitive material (the at-rest encryption secret,
//! decrypted key halves) that are zeroed when dropped and never printed.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure byte buffer that is zeroed when dropped
///
/// # Example
///
/// ```
/// use keycustody::secure_memory::SecureBytes;
///
/// let secret = SecureBytes::new(b"sensitive");
/// assert_eq!(secret.len(), 9);
/// assert_eq!(format!("{:?}", secret), "SecureBytes([REDACTED; 9 bytes])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    /// Copy `data` into a new secure buffer
    pub fn new(data: &[u8]) -> Self {
        Self {
            inner: data.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Interpret the contents as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.inner).ok()
    }

    /// Compare with another buffer without short-circuiting on the first
    /// differing byte
    pub fn ct_eq(&self, other: &[u8]) -> bool {
        self.inner.len() == other.len() && bool::from(self.inner.as_slice().ct_eq(other))
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(inner: Vec<u8>) -> Self {
        Self { inner }
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(&other.inner)
    }
}

impl Eq for SecureBytes {}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes([REDACTED; {} bytes])", self.inner.len())
    }
}
