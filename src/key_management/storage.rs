// Storage backends for the encrypted key halves

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{error_codes, CustodyError, CustodyResult};

/// A directory-like location holding named text entries
///
/// Entries hold serialized `EncryptedBlob`s, never plaintext key material.
pub trait KeyStorage: Send + Sync {
    /// Create the location if it does not exist yet
    fn ensure_location(&self) -> CustodyResult<()>;

    /// Whether the named entry exists
    fn exists(&self, name: &str) -> CustodyResult<bool>;

    /// Read the named entry
    fn read(&self, name: &str) -> CustodyResult<String>;

    /// Create or replace the named entry
    fn write(&self, name: &str, contents: &str) -> CustodyResult<()>;

    /// Human-readable location for logs and operator diagnostics
    fn describe(&self) -> String;
}

/// Key storage in a filesystem directory
///
/// Files are written owner-read/write only (`0600`) on unix, via a temporary
/// file that is synced and then renamed over the target.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> CustodyResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(CustodyError::configuration_error(
                "key file name",
                &format!("'{}' is not a plain file name", name),
                error_codes::INVALID_KEY_FILE_NAME,
            ));
        }
        Ok(self.root.join(name))
    }
}

impl KeyStorage for FileSystemStorage {
    fn ensure_location(&self) -> CustodyResult<()> {
        if self.root.is_dir() {
            return Ok(());
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            CustodyError::storage_error(
                "create keys directory",
                &self.describe(),
                &e.to_string(),
                error_codes::STORAGE_CREATE_LOCATION_FAILED,
            )
        })?;
        log::info!("Created keys directory {}", self.root.display());
        Ok(())
    }

    fn exists(&self, name: &str) -> CustodyResult<bool> {
        let path = self.entry_path(name)?;
        path.try_exists().map_err(|e| {
            CustodyError::storage_error(
                "check key file",
                &path.display().to_string(),
                &e.to_string(),
                error_codes::STORAGE_READ_FAILED,
            )
        })
    }

    fn read(&self, name: &str) -> CustodyResult<String> {
        let path = self.entry_path(name)?;
        fs::read_to_string(&path).map_err(|e| {
            CustodyError::storage_error(
                "read key file",
                &path.display().to_string(),
                &e.to_string(),
                error_codes::STORAGE_READ_FAILED,
            )
        })
    }

    fn write(&self, name: &str, contents: &str) -> CustodyResult<()> {
        let path = self.entry_path(name)?;
        let tmp_path = self.root.join(format!(".{}.tmp", name));
        let write_failed = |e: std::io::Error| {
            CustodyError::storage_error(
                "write key file",
                &path.display().to_string(),
                &e.to_string(),
                error_codes::STORAGE_WRITE_FAILED,
            )
        };

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path).map_err(write_failed)?;
        file.write_all(contents.as_bytes()).map_err(write_failed)?;
        file.flush().map_err(write_failed)?;
        file.sync_all().map_err(write_failed)?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(write_failed)?;
        log::debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-process key storage, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStorage {
    created: AtomicBool,
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ensure_location` has been called
    pub fn location_exists(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    /// Remove an entry, returning its previous contents
    pub fn remove(&self, name: &str) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStorage for MemoryStorage {
    fn ensure_location(&self) -> CustodyResult<()> {
        self.created.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self, name: &str) -> CustodyResult<bool> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name))
    }

    fn read(&self, name: &str) -> CustodyResult<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| {
                CustodyError::storage_error(
                    "read key entry",
                    &format!("memory:{}", name),
                    "entry not found",
                    error_codes::STORAGE_READ_FAILED,
                )
            })
    }

    fn write(&self, name: &str, contents: &str) -> CustodyResult<()> {
        if !self.location_exists() {
            return Err(CustodyError::storage_error(
                "write key entry",
                &format!("memory:{}", name),
                "location has not been created",
                error_codes::STORAGE_WRITE_FAILED,
            ));
        }
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl<T: KeyStorage + ?Sized> KeyStorage for std::sync::Arc<T> {
    fn ensure_location(&self) -> CustodyResult<()> {
        (**self).ensure_location()
    }

    fn exists(&self, name: &str) -> CustodyResult<bool> {
        (**self).exists(name)
    }

    fn read(&self, name: &str) -> CustodyResult<String> {
        (**self).read(name)
    }

    fn write(&self, name: &str, contents: &str) -> CustodyResult<()> {
        (**self).write(name, contents)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
