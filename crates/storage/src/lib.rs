pub mod adapter;
pub mod error;
pub mod file;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use adapter::{CONTACTS_KEY, PersistenceAdapter};
pub use error::StorageError;
pub use file::{HostChannel, HostFileStore};
pub use sqlite::SqliteBlobStore;
pub use traits::*;
