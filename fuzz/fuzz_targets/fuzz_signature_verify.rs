#![no_main]

use std::sync::{Arc, OnceLock};

use arbitrary::Arbitrary;
use keycustody::key_management::KeyPair;
use keycustody::signature::{self, Signature, SignatureService};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct VerifyFuzzInput {
    document: Vec<u8>,
    signature: Vec<u8>,
    encoded: String,
    public_key_pem: String,
}

fn signer() -> &'static SignatureService {
    static SIGNER: OnceLock<SignatureService> = OnceLock::new();
    SIGNER.get_or_init(|| {
        let keypair = KeyPair::generate(2048).expect("key generation");
        SignatureService::new(Arc::new(keypair)).expect("signature service")
    })
}

fuzz_target!(|input: VerifyFuzzInput| {
    let signer = signer();

    // Arbitrary signature bytes: an error or a mismatch, never a panic
    let raw = Signature::from_bytes(input.signature.clone());
    if let Ok(true) = signer.verify(&input.document, &raw) {
        panic!("forged signature accepted");
    }

    if let Ok(decoded) = Signature::from_base64(&input.encoded) {
        let _ = signer.verify(&input.document, &decoded);
    }

    // Untrusted public key material
    let _ = signature::verify(&input.document, &input.signature, &input.public_key_pem);

    // A genuine signature still verifies after the noise above
    let genuine = signer.sign(&input.document).expect("sign");
    assert!(signer.verify(&input.document, &genuine).expect("verify"));
});
