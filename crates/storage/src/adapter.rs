use std::sync::Arc;

use contactbook_core::{Contact, ContactId};
use serde_json::Value;

use crate::error::StorageError;
use crate::file::HostChannel;
use crate::traits::{BlobStore, StoreKind};

/// Key under which the contacts snapshot lives.
pub const CONTACTS_KEY: &str = "contacts";

/// Uniform load/save of the contact collection over whichever local
/// substrate was picked at startup. Never raises: failed loads come back
/// empty and failed saves come back `false`, both logged.
#[derive(Clone)]
pub struct PersistenceAdapter {
    backend: Arc<dyn BlobStore>,
}

impl PersistenceAdapter {
    pub fn new(backend: Arc<dyn BlobStore>) -> Self {
        Self { backend }
    }

    /// Prefer the host's file channel when it is available, otherwise fall
    /// back to the keyed local store.
    pub fn select(keyed: Arc<dyn BlobStore>, host: Option<&HostChannel>) -> Self {
        let backend: Arc<dyn BlobStore> = match host {
            Some(channel) => Arc::new(channel.open_store()),
            None => keyed,
        };
        tracing::debug!(kind = backend.kind().as_str(), "persistence backend selected");
        Self { backend }
    }

    pub fn kind(&self) -> StoreKind {
        self.backend.kind()
    }

    pub fn load(&self, key: &str) -> Vec<Contact> {
        match self.try_load(key) {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(key, kind = self.kind().as_str(), error = %e, "load failed");
                Vec::new()
            }
        }
    }

    pub fn save(&self, key: &str, contacts: &[Contact]) -> bool {
        match self.try_save(key, contacts) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, kind = self.kind().as_str(), error = %e, "save failed");
                false
            }
        }
    }

    fn try_load(&self, key: &str) -> Result<Vec<Contact>, StorageError> {
        let raw = match self.backend.read(key)? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(Vec::new()),
        };
        let records: Vec<Value> = serde_json::from_str(&raw)?;
        let total = records.len();
        let contacts: Vec<Contact> = records.into_iter().filter_map(decode_record).collect();
        if contacts.len() != total {
            tracing::warn!(
                key,
                skipped = total - contacts.len(),
                "dropped cached records without an object shape or id"
            );
        }
        Ok(contacts)
    }

    fn try_save(&self, key: &str, contacts: &[Contact]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(contacts)?;
        self.backend.write(key, &raw)
    }
}

/// Decode one cached record, coercing mistyped scalar fields the same way
/// remote documents are. Records that are not objects or lack an id are
/// unusable.
fn decode_record(record: Value) -> Option<Contact> {
    let Value::Object(doc) = record else {
        return None;
    };
    let id = match doc.get("id")? {
        Value::String(id) if !id.is_empty() => id.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(Contact::from_document(ContactId::from_remote(id), doc))
}
