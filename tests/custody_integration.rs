//! End-to-end tests for startup, restart and signing against real key files

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use keycustody::config::{ENV_BLOB_CIPHER, ENV_ENCRYPTION_SECRET, ENV_KEYS_DIRECTORY};
use keycustody::key_management::{FileSystemStorage, PRIVATE_KEY_PEM_HEADER, PUBLIC_KEY_PEM_HEADER};
use keycustody::prelude::*;
use tempfile::tempdir;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

fn config_for(dir: &Path, extra: &[(&str, &str)]) -> CustodyConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert(ENV_ENCRYPTION_SECRET.to_string(), SECRET.to_string());
    vars.insert(
        ENV_KEYS_DIRECTORY.to_string(),
        dir.display().to_string(),
    );
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    CustodyConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

#[test]
fn test_signatures_survive_restart() {
    let dir = tempdir().unwrap();
    let keys = dir.path().join("keys");
    let document = b"Quarterly report, Q3";

    // First process: generates the keypair
    let signature = {
        let signer = bootstrap(&config_for(&keys, &[])).expect("first start");
        signer.sign(document).expect("sign")
    };

    // Second process: decrypts the persisted keypair
    let signer = bootstrap(&config_for(&keys, &[])).expect("restart");
    assert!(signer.verify(document, &signature).unwrap());
    assert!(verify(document, signature.as_bytes(), signer.public_key_pem()).unwrap());
}

#[test]
fn test_empty_location_scenario() {
    let dir = tempdir().unwrap();
    let keys = dir.path().join("fresh");
    let custodian = KeyCustodian::from_config(&config_for(&keys, &[]));

    assert_eq!(custodian.state().unwrap(), CustodianState::Uninitialized);
    let keypair = custodian.initialize().unwrap();
    assert_eq!(custodian.state().unwrap(), CustodianState::Ready);

    let entries = std::fs::read_dir(&keys)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .count();
    assert_eq!(entries, 2);

    let private_pem = String::from_utf8(keypair.private_key_pem().to_vec()).unwrap();
    assert!(private_pem.starts_with(PRIVATE_KEY_PEM_HEADER));
    assert!(keypair.public_key_pem().starts_with(PUBLIC_KEY_PEM_HEADER));
}

#[test]
fn test_changed_secret_aborts_startup() {
    let dir = tempdir().unwrap();
    bootstrap(&config_for(dir.path(), &[])).unwrap();

    let mut config = config_for(dir.path(), &[]);
    config.secret = EncryptionSecret::from_config_value(&"11".repeat(32)).unwrap();

    let err = bootstrap(&config).unwrap_err();
    assert!(err.is_crypto_error());
    assert_eq!(err.fault(), Fault::Server);
    assert!(!err.user_friendly_message().contains(SECRET));
}

#[test]
fn test_authenticated_mode_detects_file_tampering() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path(), &[(ENV_BLOB_CIPHER, "aes-256-gcm")]);
    bootstrap(&config).unwrap();

    let public_file = dir.path().join(&config.public_key_file);
    let stored = std::fs::read_to_string(&public_file).unwrap();
    let blob = EncryptedBlob::parse(&stored).unwrap();
    let mut ciphertext = blob.ciphertext().to_vec();
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x01;
    let tampered = EncryptedBlob::new(blob.iv().to_vec(), ciphertext).unwrap();
    std::fs::write(&public_file, tampered.to_serialized()).unwrap();

    let err = bootstrap(&config).unwrap_err();
    assert_eq!(err.error_code(), keycustody::error::error_codes::DECRYPTION_FAILED);
}

#[test]
fn test_shared_signer_across_threads() {
    let dir = tempdir().unwrap();
    let custodian = Arc::new(KeyCustodian::new(
        FileSystemStorage::new(dir.path()),
        EncryptionSecret::from_config_value(SECRET).unwrap(),
    ));

    let keypair = custodian.initialize().unwrap();
    let signer = Arc::new(SignatureService::new(keypair).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let signer = Arc::clone(&signer);
            std::thread::spawn(move || {
                let document = vec![i as u8; 1024];
                let signature = signer.sign(&document).unwrap();
                signer.verify(&document, &signature).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn test_pss_scheme_from_config() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path(), &[("SIGNATURE_SCHEME", "rsa-pss-sha256")]);
    let signer = bootstrap(&config).unwrap();

    assert_eq!(signer.scheme(), SignatureScheme::RsaPssSha256);
    let signature = signer.sign(b"pss").unwrap();
    assert!(signer.verify(b"pss", &signature).unwrap());
}
