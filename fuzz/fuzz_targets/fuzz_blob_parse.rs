#![no_main]

use arbitrary::Arbitrary;
use keycustody::blob::{self, CipherMode, EncryptedBlob, EncryptionSecret};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct BlobFuzzInput {
    serialized: String,
    key: [u8; 32],
    authenticated: bool,
}

fuzz_target!(|input: BlobFuzzInput| {
    let mode = if input.authenticated {
        CipherMode::Aes256Gcm
    } else {
        CipherMode::Aes256Cbc
    };
    let secret = match EncryptionSecret::from_bytes(&input.key) {
        Ok(secret) => secret,
        Err(_) => return,
    };

    // Parsing arbitrary text must fail cleanly, never panic
    if let Ok(parsed) = EncryptedBlob::parse(&input.serialized) {
        // Anything that parses must serialize back to a parseable form
        let reparsed = EncryptedBlob::parse(&parsed.to_serialized())
            .expect("serialized blob must parse");
        assert_eq!(parsed, reparsed);
    }

    let _ = blob::decrypt_from_str(mode, &input.serialized, &secret);
});
