//! keycustody: generate-once RSA signing key held encrypted at rest
//!
//! Every command runs the startup phase first: load configuration, then
//! generate or decrypt the keypair. Nothing is signed or verified until that
//! succeeds.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use keycustody::config::{
    ENV_BLOB_CIPHER, ENV_KEYS_DIRECTORY, ENV_KEY_BITS, ENV_PRIVATE_KEY_FILE, ENV_PUBLIC_KEY_FILE,
    ENV_SIGNATURE_SCHEME,
};
use keycustody::error::error_codes;
use keycustody::{bootstrap, CustodyConfig, CustodyError, CustodyResult, Signature};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keycustody")]
#[command(about = "Key custody and document signing with a generate-once RSA keypair")]
#[command(after_help = "The encryption secret is read from ENCRYPTION_SECRET only. \
IV_LENGTH and CUSTODY_ENV/APP_ENV are read from the environment as well.")]
struct Cli {
    /// Directory holding the encrypted key files
    #[arg(long, global = true, env = "KEYS_DIRECTORY")]
    keys_directory: Option<String>,

    /// File name of the encrypted private key
    #[arg(long, global = true, env = "PRIVATE_KEY_FILE")]
    private_key_file: Option<String>,

    /// File name of the encrypted public key
    #[arg(long, global = true, env = "PUBLIC_KEY_FILE")]
    public_key_file: Option<String>,

    /// At-rest cipher: aes-256-cbc or aes-256-gcm
    #[arg(long, global = true, env = "BLOB_CIPHER")]
    cipher: Option<String>,

    /// Signature scheme: rsa-pkcs1v15-sha256 or rsa-pss-sha256
    #[arg(long, global = true, env = "SIGNATURE_SCHEME")]
    scheme: Option<String>,

    /// RSA modulus size for a newly generated keypair
    #[arg(long, global = true, env = "KEY_BITS")]
    key_bits: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate or load the signing keypair and print its details
    Init,
    /// Print the public key PEM
    PublicKey,
    /// Print a base64 signature of a file
    Sign {
        /// Document to sign
        file: PathBuf,
    },
    /// Check a base64 signature of a file; exits 1 when it does not match
    Verify {
        /// Document that was signed
        file: PathBuf,
        /// Base64 signature
        signature: String,
        /// Verify against this public key PEM instead of our own
        #[arg(long)]
        public_key: Option<PathBuf>,
    },
}

impl Cli {
    /// Command-line values win; everything else falls through to the
    /// process environment.
    fn setting(&self, name: &str) -> Option<String> {
        let flag = match name {
            ENV_KEYS_DIRECTORY => &self.keys_directory,
            ENV_PRIVATE_KEY_FILE => &self.private_key_file,
            ENV_PUBLIC_KEY_FILE => &self.public_key_file,
            ENV_BLOB_CIPHER => &self.cipher,
            ENV_SIGNATURE_SCHEME => &self.scheme,
            ENV_KEY_BITS => &self.key_bits,
            _ => return std::env::var(name).ok(),
        };
        flag.clone()
    }

    fn config(&self) -> CustodyResult<CustodyConfig> {
        CustodyConfig::from_lookup(|name| self.setting(name))
    }
}

#[derive(Serialize)]
struct KeyInfo {
    fingerprint: String,
    key_bits: usize,
    keys_directory: String,
    cipher: String,
    scheme: String,
}

#[derive(Serialize)]
struct SignOutput {
    signature: String,
    scheme: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(remediation) = e.suggested_remediation() {
                eprintln!("hint: {}", remediation);
            }
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> CustodyResult<ExitCode> {
    let config = cli.config()?;
    let signer = bootstrap(&config)?;
    let mut stdout = std::io::stdout();

    match &cli.command {
        Command::Init => {
            let keypair = signer.key_pair();
            let info = KeyInfo {
                fingerprint: keypair.fingerprint(),
                key_bits: keypair.key_bits()?,
                keys_directory: config.keys_directory.display().to_string(),
                cipher: config.cipher_mode.to_string(),
                scheme: signer.scheme().to_string(),
            };
            write_json(&mut stdout, &info)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::PublicKey => {
            print!("{}", signer.public_key_pem());
            Ok(ExitCode::SUCCESS)
        }
        Command::Sign { file } => {
            let document = read_file(file)?;
            let signature = signer.sign(&document)?;
            write_json(
                &mut stdout,
                &SignOutput {
                    signature: signature.to_base64(),
                    scheme: signer.scheme().to_string(),
                },
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            file,
            signature,
            public_key,
        } => {
            let document = read_file(file)?;
            let signature = Signature::from_base64(signature)?;
            let valid = match public_key {
                None => signer.verify(&document, &signature)?,
                Some(pem_file) => {
                    let pem = String::from_utf8(read_file(pem_file)?).map_err(|_| {
                        CustodyError::crypto_error(
                            "read public key",
                            "public key file is not UTF-8",
                            error_codes::PUBLIC_KEY_MALFORMED,
                        )
                    })?;
                    signer.verify_with(&document, signature.as_bytes(), &pem)?
                }
            };
            if valid {
                println!("valid");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid");
                Ok(ExitCode::from(1))
            }
        }
    }
}

fn read_file(path: &Path) -> CustodyResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        CustodyError::storage_error(
            "read input file",
            &path.display().to_string(),
            &e.to_string(),
            error_codes::STORAGE_READ_FAILED,
        )
    })
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> CustodyResult<()> {
    serde_json::to_writer_pretty(&mut *writer, value)
        .map_err(std::io::Error::from)
        .and_then(|()| writeln!(writer))
        .map_err(|e| {
            CustodyError::storage_error(
                "write output",
                "stdout",
                &e.to_string(),
                error_codes::STORAGE_IO_FAILED,
            )
        })
}
