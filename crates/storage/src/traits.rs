use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Keyed store local to this installation.
    Keyed,
    /// Single file owned by the desktop host.
    HostFile,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyed => "keyed",
            Self::HostFile => "host-file",
        }
    }
}

/// A store of whole string snapshots addressed by key. A write replaces the
/// previous value in full or not at all.
pub trait BlobStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
