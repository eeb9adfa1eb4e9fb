use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{error_codes, CustodyError, CustodyResult};
use crate::key_management::{parse_private_key_pem, parse_public_key_pem, KeyPair};

/// RSA signature scheme over a SHA-256 document digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureScheme {
    /// RSASSA-PKCS1-v1_5 with SHA-256. Deterministic.
    #[default]
    RsaPkcs1v15Sha256,
    /// RSASSA-PSS with SHA-256 and MGF1. Randomized: each call yields
    /// different signature bytes.
    RsaPssSha256,
}

impl SignatureScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::RsaPkcs1v15Sha256 => "rsa-pkcs1v15-sha256",
            SignatureScheme::RsaPssSha256 => "rsa-pss-sha256",
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, SignatureScheme::RsaPkcs1v15Sha256)
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rsa-pkcs1v15-sha256" | "rsa-sha256" => Ok(SignatureScheme::RsaPkcs1v15Sha256),
            "rsa-pss-sha256" => Ok(SignatureScheme::RsaPssSha256),
            other => Err(CustodyError::configuration_error(
                "SIGNATURE_SCHEME",
                &format!("unsupported signature scheme '{}'", other),
                error_codes::UNKNOWN_SIGNATURE_SCHEME,
            )),
        }
    }
}

/// Signature bytes produced by `sign`
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 with padding
    pub fn to_base64(&self) -> String {
        base64::encode(&self.bytes)
    }

    pub fn from_base64(encoded: &str) -> CustodyResult<Self> {
        base64::decode(encoded.trim())
            .map(Self::from_bytes)
            .map_err(|e| malformed_signature(&format!("invalid base64: {}", e)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(encoded: &str) -> CustodyResult<Self> {
        hex::decode(encoded.trim())
            .map(Self::from_bytes)
            .map_err(|e| malformed_signature(&format!("invalid hex: {}", e)))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.bytes.len())
    }
}

/// Signs and verifies documents with an already-loaded keypair
///
/// Both keys are parsed once at construction; every call afterwards is a
/// pure function of its inputs.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use keycustody::key_management::KeyPair;
/// use keycustody::signature::SignatureService;
///
/// let keypair = Arc::new(KeyPair::generate(2048).unwrap());
/// let service = SignatureService::new(keypair).unwrap();
///
/// let signature = service.sign(b"quarterly report").unwrap();
/// assert!(service.verify(b"quarterly report", &signature).unwrap());
/// assert!(!service.verify(b"quarterly rep0rt", &signature).unwrap());
/// ```
#[derive(Clone)]
pub struct SignatureService {
    keypair: Arc<KeyPair>,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    scheme: SignatureScheme,
}

impl SignatureService {
    /// Service using RSASSA-PKCS1-v1_5 with SHA-256
    pub fn new(keypair: Arc<KeyPair>) -> CustodyResult<Self> {
        Self::with_scheme(keypair, SignatureScheme::default())
    }

    pub fn with_scheme(keypair: Arc<KeyPair>, scheme: SignatureScheme) -> CustodyResult<Self> {
        let private_key = keypair.private_key()?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            keypair,
            private_key,
            public_key,
            scheme,
        })
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn key_pair(&self) -> &Arc<KeyPair> {
        &self.keypair
    }

    /// SPKI PEM of the key that `verify` checks against
    pub fn public_key_pem(&self) -> &str {
        self.keypair.public_key_pem()
    }

    /// Sign the SHA-256 digest of `document`
    pub fn sign(&self, document: &[u8]) -> CustodyResult<Signature> {
        sign_with_key(self.scheme, document, &self.private_key)
    }

    /// Verify `signature` over `document` against this service's own public key
    pub fn verify(&self, document: &[u8], signature: &Signature) -> CustodyResult<bool> {
        verify_with_key(self.scheme, document, signature.as_bytes(), &self.public_key)
    }

    /// Verify `signature` over `document` against a caller-supplied public key
    pub fn verify_with(
        &self,
        document: &[u8],
        signature: &[u8],
        public_key_pem: &str,
    ) -> CustodyResult<bool> {
        let public_key = parse_public_key_pem(public_key_pem)?;
        verify_with_key(self.scheme, document, signature, &public_key)
    }
}

impl fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureService")
            .field("keypair", &self.keypair)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Sign `document` with a PEM private key using RSASSA-PKCS1-v1_5/SHA-256
pub fn sign(document: &[u8], private_key_pem: &str) -> CustodyResult<Signature> {
    let private_key = parse_private_key_pem(private_key_pem)?;
    sign_with_key(SignatureScheme::RsaPkcs1v15Sha256, document, &private_key)
}

/// Verify an RSASSA-PKCS1-v1_5/SHA-256 signature against a PEM public key.
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
/// Errors only when the public key cannot be parsed or the signature length
/// does not match the key.
pub fn verify(document: &[u8], signature: &[u8], public_key_pem: &str) -> CustodyResult<bool> {
    let public_key = parse_public_key_pem(public_key_pem)?;
    verify_with_key(
        SignatureScheme::RsaPkcs1v15Sha256,
        document,
        signature,
        &public_key,
    )
}

/// Sign with an already-parsed private key
pub fn sign_with_key(
    scheme: SignatureScheme,
    document: &[u8],
    private_key: &RsaPrivateKey,
) -> CustodyResult<Signature> {
    let digest = Sha256::digest(document);

    let result = match scheme {
        SignatureScheme::RsaPkcs1v15Sha256 => {
            private_key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        }
        SignatureScheme::RsaPssSha256 => {
            private_key.sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &digest)
        }
    };

    let bytes = result.map_err(|e| {
        CustodyError::crypto_error(
            &format!("{} signing", scheme),
            &e.to_string(),
            error_codes::SIGNING_FAILED,
        )
    })?;

    log::debug!("Signed {}-byte document with {}", document.len(), scheme);
    Ok(Signature::from_bytes(bytes))
}

/// Verify with an already-parsed public key
pub fn verify_with_key(
    scheme: SignatureScheme,
    document: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> CustodyResult<bool> {
    if signature.len() != public_key.size() {
        return Err(malformed_signature(&format!(
            "expected {} bytes for this key, got {} bytes",
            public_key.size(),
            signature.len()
        )));
    }

    let digest = Sha256::digest(document);

    let result = match scheme {
        SignatureScheme::RsaPkcs1v15Sha256 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        }
        SignatureScheme::RsaPssSha256 => {
            public_key.verify(Pss::new::<Sha256>(), &digest, signature)
        }
    };

    // A well-sized signature that does not check out (including one whose
    // value exceeds the modulus) is a mismatch, not an error.
    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            log::debug!(
                "Signature mismatch for {}-byte document: {}",
                document.len(),
                e
            );
            Ok(false)
        }
    }
}

fn malformed_signature(cause: &str) -> CustodyError {
    CustodyError::crypto_error("parse signature", cause, error_codes::SIGNATURE_MALFORMED)
}
