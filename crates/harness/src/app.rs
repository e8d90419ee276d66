use std::sync::Arc;

use contactbook_core::{Contact, Document};
use contactbook_engine::{
    AppConfig, AuthGate, ContactStore, Migrator, RemoteConfig, RemoteHandles, StoreError,
};
use contactbook_remote::{IdentityProvider, LegacyConnector, RemoteDatabase};
use contactbook_storage::{CONTACTS_KEY, HostChannel, PersistenceAdapter, SqliteBlobStore, StorageError};
use serde_json::Value;
use tempfile::TempDir;

use crate::identity::FakeIdentityProvider;
use crate::remote::MemoryRemote;

/// One application instance on a throwaway data directory, wired to
/// in-memory remote fakes.
pub struct TestApp {
    pub dir: TempDir,
    pub config: AppConfig,
    pub blobs: Arc<SqliteBlobStore>,
    pub remote: Arc<MemoryRemote>,
    pub identity: Arc<FakeIdentityProvider>,
}

impl TestApp {
    /// Local mode, keyed store.
    pub fn local() -> Result<Self, StorageError> {
        Self::build(false, FakeIdentityProvider::signed_out())
    }

    /// Remote mode with the given identity provider.
    pub fn remote(identity: FakeIdentityProvider) -> Result<Self, StorageError> {
        Self::build(true, identity)
    }

    /// Local mode with the host file channel available.
    pub fn desktop() -> Result<Self, StorageError> {
        let mut app = Self::local()?;
        let host_dir = app.dir.path().join("host");
        app.config = app.config.with_host_dir(host_dir);
        Ok(app)
    }

    fn build(remote: bool, identity: FakeIdentityProvider) -> Result<Self, StorageError> {
        let dir = TempDir::new()?;
        let mut config = AppConfig::local(dir.path());
        if remote {
            config = config.with_remote(test_remote_config());
        }
        let blobs = Arc::new(SqliteBlobStore::open(config.local_db_path())?);
        Ok(Self {
            dir,
            config,
            blobs,
            remote: Arc::new(MemoryRemote::new()),
            identity: Arc::new(identity),
        })
    }

    pub fn adapter(&self) -> PersistenceAdapter {
        let host = HostChannel::probe(self.config.host_dir());
        PersistenceAdapter::select(self.blobs.clone(), host.as_ref())
    }

    pub fn gate(&self) -> AuthGate {
        let provider: Arc<dyn IdentityProvider> = self.identity.clone();
        AuthGate::new(&self.config, Some(provider))
    }

    pub fn handles(&self) -> RemoteHandles {
        let database: Arc<dyn RemoteDatabase> = self.remote.clone();
        RemoteHandles::new(self.gate(), database)
    }

    /// A store that has not loaded yet.
    pub fn store(&self) -> Result<ContactStore, StoreError> {
        ContactStore::new(&self.config, self.adapter(), Some(self.handles()))
    }

    pub async fn open_store(&self) -> Result<ContactStore, StoreError> {
        ContactStore::open(&self.config, self.adapter(), Some(self.handles())).await
    }

    pub fn migrator(&self, connector: Arc<dyn LegacyConnector>) -> Migrator {
        let database: Arc<dyn RemoteDatabase> = self.remote.clone();
        Migrator::new(&self.config, self.gate(), Some(database), connector)
    }

    /// Contacts currently in the local cache.
    pub fn cached(&self) -> Vec<Contact> {
        self.adapter().load(CONTACTS_KEY)
    }

    pub fn seed_cache(&self, contacts: &[Contact]) -> bool {
        self.adapter().save(CONTACTS_KEY, contacts)
    }
}

pub fn test_remote_config() -> RemoteConfig {
    RemoteConfig {
        api_key: "test-api-key".into(),
        project_id: "contactbook-test".into(),
        app_id: "1:000:web:test".into(),
        ..RemoteConfig::default()
    }
}

/// Build a document from `(field, value)` pairs.
pub fn document(fields: &[(&str, &str)]) -> Document {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
