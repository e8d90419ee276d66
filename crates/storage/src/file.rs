use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::traits::{BlobStore, StoreKind};

pub const HOST_FILE_NAME: &str = "contacts.json";

/// The privileged file channel a desktop host exposes: a data directory the
/// host owns and this process may write.
#[derive(Debug, Clone)]
pub struct HostChannel {
    data_dir: PathBuf,
}

impl HostChannel {
    /// Runtime capability check. The channel exists only when the host
    /// handed over a data directory that exists or can be created.
    pub fn probe(data_dir: Option<&Path>) -> Option<Self> {
        let dir = data_dir?;
        match fs::create_dir_all(dir) {
            Ok(()) if dir.is_dir() => Some(Self {
                data_dir: dir.to_path_buf(),
            }),
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "host data directory unavailable");
                None
            }
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn open_store(&self) -> HostFileStore {
        HostFileStore::new(self.data_dir.join(HOST_FILE_NAME))
    }
}

/// One JSON file holding the whole contacts snapshot. The key is ignored;
/// the host only knows about this one file.
pub struct HostFileStore {
    path: PathBuf,
}

impl HostFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BlobStore for HostFileStore {
    fn kind(&self) -> StoreKind {
        StoreKind::HostFile
    }

    fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Re-indents JSON input for hand inspection, then swaps the file in
    /// with a rename so readers never see a half-written snapshot.
    fn write(&self, _key: &str, value: &str) -> Result<(), StorageError> {
        let pretty = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(parsed) => serde_json::to_string_pretty(&parsed)?,
            Err(_) => value.to_string(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, pretty)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
