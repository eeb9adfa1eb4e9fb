use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{AesGcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use super::secret::EncryptionSecret;
use crate::error::{error_codes, CustodyError, CustodyResult};
use crate::secure_memory::SecureBytes;

/// Bytes of fresh random IV drawn for every encryption call
pub const IV_LENGTH: usize = 16;

/// Separator between the hex IV and the hex ciphertext in the serialized form
pub const SEPARATOR: char = ':';

type Aes256CbcEnc = cbc::Encryptor<::aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<::aes::Aes256>;
type Aes256Gcm16 = AesGcm<::aes::Aes256, U16>;

/// Block cipher mode used for at-rest encryption
///
/// The mode is not recorded in the serialized blob; a key store must be read
/// with the same mode it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMode {
    /// AES-256-CBC with PKCS#7 padding. No integrity protection.
    #[default]
    Aes256Cbc,
    /// AES-256-GCM with a 16-byte nonce; the ciphertext carries a 16-byte tag.
    Aes256Gcm,
}

impl CipherMode {
    /// Whether decryption detects modified ciphertext
    pub fn is_authenticated(&self) -> bool {
        matches!(self, CipherMode::Aes256Gcm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CipherMode::Aes256Cbc => "aes-256-cbc",
            CipherMode::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherMode {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-256-cbc" => Ok(CipherMode::Aes256Cbc),
            "aes-256-gcm" => Ok(CipherMode::Aes256Gcm),
            other => Err(CustodyError::configuration_error(
                "BLOB_CIPHER",
                &format!("unsupported cipher mode '{}'", other),
                error_codes::UNKNOWN_CIPHER_MODE,
            )),
        }
    }
}

/// An IV plus ciphertext, as persisted to storage
///
/// # Examples
///
/// ```
/// use keycustody::blob::{decrypt, encrypt, EncryptedBlob, EncryptionSecret};
///
/// let secret = EncryptionSecret::from_bytes(&[7u8; 32]).unwrap();
/// let blob = encrypt(b"-----BEGIN PUBLIC KEY-----", &secret).unwrap();
///
/// let stored = blob.to_serialized();
/// let parsed = EncryptedBlob::parse(&stored).unwrap();
/// let plaintext = decrypt(&parsed, &secret).unwrap();
/// assert_eq!(plaintext.as_bytes(), b"-----BEGIN PUBLIC KEY-----");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Assemble a blob from its parts
    pub fn new(iv: Vec<u8>, ciphertext: Vec<u8>) -> CustodyResult<Self> {
        if iv.len() != IV_LENGTH {
            return Err(malformed(&format!(
                "iv must be {} bytes, got {} bytes",
                IV_LENGTH,
                iv.len()
            )));
        }
        if ciphertext.is_empty() {
            return Err(malformed("ciphertext is empty"));
        }

        Ok(Self { iv, ciphertext })
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// `hex(iv) + ":" + hex(ciphertext)`
    pub fn to_serialized(&self) -> String {
        format!(
            "{}{}{}",
            hex::encode(&self.iv),
            SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }

    /// Parse the serialized form. Surrounding whitespace is ignored.
    pub fn parse(serialized: &str) -> CustodyResult<Self> {
        let (iv_hex, ciphertext_hex) = serialized
            .trim()
            .split_once(SEPARATOR)
            .ok_or_else(|| malformed("missing ':' separator"))?;

        let iv = hex::decode(iv_hex).map_err(|e| malformed(&format!("iv is not hex: {}", e)))?;
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| malformed(&format!("ciphertext is not hex: {}", e)))?;

        Self::new(iv, ciphertext)
    }
}

impl fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_serialized())
    }
}

impl FromStr for EncryptedBlob {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Draw a fresh random IV
pub fn generate_iv() -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt with AES-256-CBC under a fresh IV
pub fn encrypt(plaintext: &[u8], secret: &EncryptionSecret) -> CustodyResult<EncryptedBlob> {
    encrypt_with(CipherMode::Aes256Cbc, plaintext, secret)
}

/// Decrypt an AES-256-CBC blob.
///
/// CBC has no integrity check: a wrong secret or corrupted ciphertext is
/// usually caught by the padding check, but not always.
pub fn decrypt(blob: &EncryptedBlob, secret: &EncryptionSecret) -> CustodyResult<SecureBytes> {
    decrypt_with(CipherMode::Aes256Cbc, blob, secret)
}

/// Encrypt with the given mode under a fresh IV
pub fn encrypt_with(
    mode: CipherMode,
    plaintext: &[u8],
    secret: &EncryptionSecret,
) -> CustodyResult<EncryptedBlob> {
    let iv = generate_iv();

    let ciphertext = match mode {
        CipherMode::Aes256Cbc => Aes256CbcEnc::new_from_slices(secret.as_bytes(), &iv)
            .map_err(|e| encryption_failed(mode, &e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        CipherMode::Aes256Gcm => Aes256Gcm16::new_from_slice(secret.as_bytes())
            .map_err(|e| encryption_failed(mode, &e.to_string()))?
            .encrypt(Nonce::<U16>::from_slice(&iv), plaintext)
            .map_err(|e| encryption_failed(mode, &e.to_string()))?,
    };

    log::debug!(
        "Encrypted {} bytes with {} into {} bytes",
        plaintext.len(),
        mode,
        ciphertext.len()
    );

    EncryptedBlob::new(iv.to_vec(), ciphertext)
}

/// Decrypt with the given mode
pub fn decrypt_with(
    mode: CipherMode,
    blob: &EncryptedBlob,
    secret: &EncryptionSecret,
) -> CustodyResult<SecureBytes> {
    let plaintext = match mode {
        CipherMode::Aes256Cbc => Aes256CbcDec::new_from_slices(secret.as_bytes(), blob.iv())
            .map_err(|e| decryption_failed(mode, &e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(blob.ciphertext())
            .map_err(|_| {
                decryption_failed(mode, "invalid padding (wrong secret or corrupted data)")
            })?,
        CipherMode::Aes256Gcm => Aes256Gcm16::new_from_slice(secret.as_bytes())
            .map_err(|e| decryption_failed(mode, &e.to_string()))?
            .decrypt(Nonce::<U16>::from_slice(blob.iv()), blob.ciphertext())
            .map_err(|_| {
                decryption_failed(mode, "authentication failed (wrong secret or corrupted data)")
            })?,
    };

    Ok(SecureBytes::from(plaintext))
}

/// Encrypt and serialize in one step
pub fn encrypt_to_string(
    mode: CipherMode,
    plaintext: &[u8],
    secret: &EncryptionSecret,
) -> CustodyResult<String> {
    Ok(encrypt_with(mode, plaintext, secret)?.to_serialized())
}

/// Parse and decrypt in one step
pub fn decrypt_from_str(
    mode: CipherMode,
    serialized: &str,
    secret: &EncryptionSecret,
) -> CustodyResult<SecureBytes> {
    decrypt_with(mode, &EncryptedBlob::parse(serialized)?, secret)
}

fn malformed(cause: &str) -> CustodyError {
    CustodyError::crypto_error("parse encrypted blob", cause, error_codes::BLOB_MALFORMED)
}

fn encryption_failed(mode: CipherMode, cause: &str) -> CustodyError {
    CustodyError::crypto_error(
        &format!("{} encryption", mode),
        cause,
        error_codes::ENCRYPTION_FAILED,
    )
}

fn decryption_failed(mode: CipherMode, cause: &str) -> CustodyError {
    CustodyError::crypto_error(
        &format!("{} decryption", mode),
        cause,
        error_codes::DECRYPTION_FAILED,
    )
}
