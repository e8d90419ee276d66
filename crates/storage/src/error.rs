use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database schema v{found} is newer than supported v{supported}")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("core error: {0}")]
    Core(#[from] contactbook_core::CoreError),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
