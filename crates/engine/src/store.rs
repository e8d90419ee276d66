use std::collections::HashSet;
use std::sync::Arc;

use contactbook_core::contact::now_timestamp;
use contactbook_core::{Contact, ContactDraft, ContactId, ContactPatch, sort_contacts};
use contactbook_remote::{CONTACTS_COLLECTION, Query, RemoteDatabase, RemoteError};
use contactbook_storage::{CONTACTS_KEY, PersistenceAdapter};
use tokio::sync::watch;

use crate::auth::AuthGate;
use crate::config::AppConfig;
use crate::error::{Mutation, MutationFailure, StoreError, WriteFailure};

const ORDER_FIELD: &str = "name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Loading,
    /// Settled. A failed remote read also lands here, with the cached
    /// contacts kept and the failure in [`StoreSnapshot::error`].
    Ready,
}

impl StoreStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Loading)
    }
}

/// What a UI renders: the status, the ordered contacts and the last error.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub status: StoreStatus,
    pub contacts: Vec<Contact>,
    pub error: Option<String>,
}

/// Handles to the remote substrate, present only when it is configured.
#[derive(Clone)]
pub struct RemoteHandles {
    pub gate: AuthGate,
    pub database: Arc<dyn RemoteDatabase>,
}

impl RemoteHandles {
    pub fn new(gate: AuthGate, database: Arc<dyn RemoteDatabase>) -> Self {
        Self { gate, database }
    }
}

/// Owns the in-memory ordered collection and routes every change to the
/// active substrate.
///
/// Mutations are applied to memory before the substrate call is issued and
/// are never rolled back. A failed write comes back as
/// [`StoreError::Mutation`]; callers that need memory and substrate to agree
/// again call [`ContactStore::reload`].
pub struct ContactStore {
    adapter: PersistenceAdapter,
    remote: Option<RemoteHandles>,
    contacts: Vec<Contact>,
    status: StoreStatus,
    error: Option<String>,
    snapshots: watch::Sender<StoreSnapshot>,
}

impl ContactStore {
    /// Remote handles are ignored in local mode and required in remote mode.
    pub fn new(
        config: &AppConfig,
        adapter: PersistenceAdapter,
        remote: Option<RemoteHandles>,
    ) -> Result<Self, StoreError> {
        let remote = if config.remote_configured() {
            Some(remote.ok_or(StoreError::MissingRemote)?)
        } else {
            None
        };
        let (snapshots, _) = watch::channel(StoreSnapshot {
            status: StoreStatus::Uninitialized,
            contacts: Vec::new(),
            error: None,
        });
        Ok(Self {
            adapter,
            remote,
            contacts: Vec::new(),
            status: StoreStatus::Uninitialized,
            error: None,
            snapshots,
        })
    }

    /// Construct and run the initial load.
    pub async fn open(
        config: &AppConfig,
        adapter: PersistenceAdapter,
        remote: Option<RemoteHandles>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new(config, adapter, remote)?;
        store.reload().await;
        Ok(store)
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn status(&self) -> StoreStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn get(&self, id: &ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|c| &c.id == id)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshots.subscribe()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Re-read the collection from the active substrate. Always settles in
    /// `Ready`; a failed remote read sets `error` instead.
    pub async fn reload(&mut self) {
        self.set_status(StoreStatus::Loading, None);
        match self.remote.clone() {
            None => {
                self.contacts = self.cached();
                tracing::debug!(count = self.contacts.len(), "loaded local contacts");
                self.set_status(StoreStatus::Ready, None);
            }
            Some(remote) => self.reload_remote(&remote).await,
        }
    }

    async fn reload_remote(&mut self, remote: &RemoteHandles) {
        if remote.gate.ensure_identity().await.is_none() {
            tracing::info!("no identity; remote contacts hidden");
            self.contacts.clear();
            self.set_status(StoreStatus::Ready, None);
            return;
        }

        self.contacts = self.cached();
        self.publish();

        match fetch_remote(remote.database.as_ref()).await {
            Ok(contacts) => {
                tracing::debug!(count = contacts.len(), "loaded remote contacts");
                self.contacts = contacts;
                self.mirror();
                self.set_status(StoreStatus::Ready, None);
            }
            Err(e) => {
                tracing::error!(error = %e, "remote load failed; keeping cached contacts");
                self.set_status(StoreStatus::Ready, Some(e.to_string()));
            }
        }
    }

    /// The persisted snapshot, deduplicated by id and sorted.
    fn cached(&self) -> Vec<Contact> {
        let mut contacts = self.adapter.load(CONTACTS_KEY);
        let mut seen = HashSet::new();
        contacts.retain(|c| seen.insert(c.id.clone()));
        sort_contacts(&mut contacts);
        contacts
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn add(&mut self, draft: ContactDraft) -> Result<Contact, StoreError> {
        let draft = draft.normalized()?;
        let Some(remote) = self.remote.clone() else {
            let contact = draft.clone().into_contact(ContactId::generate(), now_timestamp());
            self.insert(contact.clone());
            if !self.persist() {
                let mutation = Mutation::Add {
                    draft,
                    local_id: Some(contact.id),
                };
                return Err(failure(mutation, true, WriteFailure::LocalSave));
            }
            return Ok(contact);
        };

        let pending = draft.clone().into_contact(ContactId::generate(), now_timestamp());
        let mutation = || Mutation::Add {
            draft: draft.clone(),
            local_id: None,
        };
        if remote.gate.ensure_identity().await.is_none() {
            return Err(failure(mutation(), false, WriteFailure::Unauthenticated));
        }
        tracing::debug!(name = %pending.name, "creating remote contact");
        let id = remote
            .database
            .create(CONTACTS_COLLECTION, pending.to_document())
            .await
            .map_err(|e| failure(mutation(), false, e.into()))?;

        let contact = Contact {
            id: ContactId::from_remote(id),
            ..pending
        };
        self.insert(contact.clone());
        self.mirror();
        Ok(contact)
    }

    /// Merge `patch` into the contact. An id missing from memory is a no-op
    /// locally but is still sent to the remote database, which rejects it.
    pub async fn update(&mut self, id: &ContactId, patch: ContactPatch) -> Result<Option<Contact>, StoreError> {
        patch.validate()?;
        let updated = self.patch_in_memory(id, &patch);
        let applied = updated.is_some();

        let Some(remote) = self.remote.clone() else {
            if applied && !self.persist() {
                let mutation = Mutation::Update { id: id.clone(), patch };
                return Err(failure(mutation, true, WriteFailure::LocalSave));
            }
            return Ok(updated);
        };

        if applied {
            self.mirror();
        }
        if patch.is_empty() {
            return Ok(updated);
        }
        if remote.gate.ensure_identity().await.is_none() {
            let mutation = Mutation::Update { id: id.clone(), patch };
            return Err(failure(mutation, applied, WriteFailure::Unauthenticated));
        }
        tracing::debug!(%id, "updating remote contact");
        if let Err(e) = remote
            .database
            .update(CONTACTS_COLLECTION, id.as_str(), patch.to_document())
            .await
        {
            let mutation = Mutation::Update { id: id.clone(), patch };
            return Err(failure(mutation, applied, e.into()));
        }
        Ok(updated)
    }

    /// Returns whether the contact was present in memory.
    pub async fn delete(&mut self, id: &ContactId) -> Result<bool, StoreError> {
        let before = self.contacts.len();
        self.contacts.retain(|c| &c.id != id);
        let removed = self.contacts.len() != before;
        if removed {
            self.publish();
        }

        let Some(remote) = self.remote.clone() else {
            if removed && !self.persist() {
                let mutation = Mutation::Delete { id: id.clone() };
                return Err(failure(mutation, true, WriteFailure::LocalSave));
            }
            return Ok(removed);
        };

        if removed {
            self.mirror();
        }
        if remote.gate.ensure_identity().await.is_none() {
            let mutation = Mutation::Delete { id: id.clone() };
            return Err(failure(mutation, removed, WriteFailure::Unauthenticated));
        }
        tracing::debug!(%id, "deleting remote contact");
        remote
            .database
            .delete(CONTACTS_COLLECTION, id.as_str())
            .await
            .map_err(|e| failure(Mutation::Delete { id: id.clone() }, removed, e.into()))?;
        Ok(removed)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn insert(&mut self, contact: Contact) {
        self.contacts.retain(|c| c.id != contact.id);
        self.contacts.push(contact);
        sort_contacts(&mut self.contacts);
        self.publish();
    }

    fn patch_in_memory(&mut self, id: &ContactId, patch: &ContactPatch) -> Option<Contact> {
        let contact = self.contacts.iter_mut().find(|c| &c.id == id)?;
        patch.apply(contact);
        let updated = contact.clone();
        sort_contacts(&mut self.contacts);
        self.publish();
        Some(updated)
    }

    /// Local mode: the adapter is the substrate.
    fn persist(&self) -> bool {
        self.adapter.save(CONTACTS_KEY, &self.contacts)
    }

    /// Remote mode: keep the local cache warm. A failed save is already
    /// logged by the adapter and does not fail the operation.
    fn mirror(&self) {
        if !self.persist() {
            tracing::warn!("contact cache is stale until the next successful save");
        }
    }

    fn set_status(&mut self, status: StoreStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(StoreSnapshot {
            status: self.status,
            contacts: self.contacts.clone(),
            error: self.error.clone(),
        });
    }
}

/// Ordered read first; any rejection falls back to an unordered read. Both
/// paths are sorted client-side so they yield the same order.
async fn fetch_remote(database: &dyn RemoteDatabase) -> Result<Vec<Contact>, RemoteError> {
    let documents = match database
        .query(CONTACTS_COLLECTION, &Query::ordered_by(ORDER_FIELD))
        .await
    {
        Ok(documents) => documents,
        Err(e) => {
            tracing::warn!(error = %e, "ordered query failed, sorting client-side");
            database.query(CONTACTS_COLLECTION, &Query::all()).await?
        }
    };
    let mut contacts: Vec<Contact> = documents
        .into_iter()
        .map(|doc| Contact::from_document(ContactId::from_remote(doc.id), doc.fields))
        .collect();
    sort_contacts(&mut contacts);
    Ok(contacts)
}

fn failure(mutation: Mutation, applied_locally: bool, cause: WriteFailure) -> StoreError {
    StoreError::Mutation(Box::new(MutationFailure {
        mutation,
        applied_locally,
        cause,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactbook_storage::{BlobStore, SqliteBlobStore, StorageError, StoreKind};

    struct ReadOnlyStore(SqliteBlobStore);

    impl BlobStore for ReadOnlyStore {
        fn kind(&self) -> StoreKind {
            StoreKind::Keyed
        }

        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.read(key)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("read-only")))
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key)
        }
    }

    fn local_store() -> (ContactStore, Arc<SqliteBlobStore>) {
        let blobs = Arc::new(SqliteBlobStore::open_in_memory().unwrap());
        let adapter = PersistenceAdapter::new(blobs.clone());
        let store = ContactStore::new(&AppConfig::local("/tmp/unused"), adapter, None).unwrap();
        (store, blobs)
    }

    #[tokio::test]
    async fn starts_uninitialized_and_loads_empty() {
        let (mut store, _) = local_store();
        assert_eq!(store.status(), StoreStatus::Uninitialized);
        store.reload().await;
        assert_eq!(store.status(), StoreStatus::Ready);
        assert!(store.contacts().is_empty());
        assert!(!store.is_remote());
    }

    #[tokio::test]
    async fn add_keeps_collection_sorted_and_persists() {
        let (mut store, blobs) = local_store();
        store.add(ContactDraft::new("zed")).await.unwrap();
        store.add(ContactDraft::new("Amy")).await.unwrap();
        store.add(ContactDraft::new("bob")).await.unwrap();

        let names: Vec<_> = store.contacts().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Amy", "bob", "zed"]);

        let reloaded = PersistenceAdapter::new(blobs).load(CONTACTS_KEY);
        assert_eq!(reloaded.len(), 3);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_before_mutation() {
        let (mut store, _) = local_store();
        let err = store.add(ContactDraft::new("   ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        let err = store
            .add(ContactDraft::new("Amy").with_phone("call me"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.contacts().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_of_absent_id_are_noops() {
        let (mut store, _) = local_store();
        let missing = ContactId::from("missing");
        assert_eq!(store.update(&missing, ContactPatch::name("x")).await.unwrap(), None);
        assert!(!store.delete(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn update_resorts_collection() {
        let (mut store, _) = local_store();
        let amy = store.add(ContactDraft::new("Amy")).await.unwrap();
        store.add(ContactDraft::new("Bob")).await.unwrap();

        let updated = store.update(&amy.id, ContactPatch::name("Zoe")).await.unwrap();
        assert_eq!(updated.map(|c| c.name), Some("Zoe".to_string()));
        let names: Vec<_> = store.contacts().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Zoe"]);
    }

    #[tokio::test]
    async fn failed_local_save_reports_divergence() {
        let blobs = SqliteBlobStore::open_in_memory().unwrap();
        let adapter = PersistenceAdapter::new(Arc::new(ReadOnlyStore(blobs)));
        let mut store = ContactStore::new(&AppConfig::local("/tmp/unused"), adapter, None).unwrap();

        let err = store.add(ContactDraft::new("Amy")).await.unwrap_err();
        assert!(err.diverged());
        let failure = err.failure().unwrap();
        assert!(matches!(failure.cause, WriteFailure::LocalSave));
        assert!(matches!(failure.mutation, Mutation::Add { local_id: Some(_), .. }));
        assert_eq!(store.contacts().len(), 1);
    }

    #[tokio::test]
    async fn reload_drops_duplicate_ids() {
        let (mut store, blobs) = local_store();
        let contact = ContactDraft::new("Amy")
            .normalized()
            .unwrap()
            .into_contact(ContactId::from("same"), now_timestamp());
        PersistenceAdapter::new(blobs).save(CONTACTS_KEY, &[contact.clone(), contact]);
        store.reload().await;
        assert_eq!(store.contacts().len(), 1);
    }

    #[test]
    fn remote_mode_requires_handles() {
        let blobs = Arc::new(SqliteBlobStore::open_in_memory().unwrap());
        let config = AppConfig::local("/tmp/unused").with_remote(crate::config::RemoteConfig {
            api_key: "k".into(),
            project_id: "p".into(),
            app_id: "a".into(),
            ..Default::default()
        });
        let result = ContactStore::new(&config, PersistenceAdapter::new(blobs), None);
        assert!(matches!(result, Err(StoreError::MissingRemote)));
    }

    #[tokio::test]
    async fn snapshots_follow_changes() {
        let (mut store, _) = local_store();
        let rx = store.subscribe();
        store.reload().await;
        store.add(ContactDraft::new("Amy")).await.unwrap();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, StoreStatus::Ready);
        assert_eq!(snapshot.contacts.len(), 1);
        assert_eq!(snapshot, store.snapshot());
    }
}
