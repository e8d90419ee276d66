use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use contactbook_core::Document;
use contactbook_remote::{Query, RemoteDatabase, RemoteDocument, RemoteError};
use serde_json::Value;
use tokio::sync::Notify;

/// How many times each remote entry point was hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub ordered_queries: usize,
    pub unordered_queries: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl CallCounts {
    pub fn writes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

#[derive(Default)]
struct RemoteState {
    documents: BTreeMap<String, Document>,
    next_id: u64,
    reject_ordered: bool,
    read_failure: Option<RemoteError>,
    write_failure: Option<RemoteError>,
    creates_before_failure: Option<usize>,
    calls: CallCounts,
}

/// In-memory document database with switchable failure modes.
///
/// Ordered queries sort by raw field bytes, like a server without locale
/// collation would.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    read_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a document directly, bypassing call counters.
    pub fn seed(&self, fields: Document) -> String {
        let mut state = self.state();
        let id = next_id(&mut state);
        state.documents.insert(id.clone(), fields);
        id
    }

    pub fn seed_named(&self, name: &str) -> String {
        let mut fields = Document::new();
        fields.insert("name".into(), Value::String(name.into()));
        self.seed(fields)
    }

    pub fn remove(&self, id: &str) -> Option<Document> {
        self.state().documents.remove(id)
    }

    /// Simulate a missing index: ordered queries fail with `QueryRejected`.
    pub fn reject_ordered_queries(&self, reject: bool) {
        self.state().reject_ordered = reject;
    }

    pub fn fail_reads(&self, failure: Option<RemoteError>) {
        self.state().read_failure = failure;
    }

    pub fn fail_writes(&self, failure: Option<RemoteError>) {
        self.state().write_failure = failure;
    }

    /// Let `n` creates succeed, then fail every create after them.
    pub fn fail_creates_after(&self, n: usize) {
        self.state().creates_before_failure = Some(n);
    }

    /// Park every query until the returned handle is notified.
    pub fn hold_reads(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.read_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(notify.clone());
        notify
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn len(&self) -> usize {
        self.state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.state().documents.get(id).cloned()
    }

    pub fn documents(&self) -> Vec<RemoteDocument> {
        self.state()
            .documents
            .iter()
            .map(|(id, fields)| RemoteDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }
}

fn next_id(state: &mut RemoteState) -> String {
    state.next_id += 1;
    format!("doc-{:04}", state.next_id)
}

fn sort_key(doc: &Document, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl RemoteDatabase for MemoryRemote {
    async fn query(&self, _collection: &str, query: &Query) -> Result<Vec<RemoteDocument>, RemoteError> {
        let gate = self.read_gate.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state();
        match &query.order_by {
            Some(_) => state.calls.ordered_queries += 1,
            None => state.calls.unordered_queries += 1,
        }
        if let Some(err) = state.read_failure.clone() {
            return Err(err);
        }
        if query.order_by.is_some() && state.reject_ordered {
            return Err(RemoteError::QueryRejected(
                "The query requires an index.".to_string(),
            ));
        }

        let mut docs: Vec<RemoteDocument> = state
            .documents
            .iter()
            .map(|(id, fields)| RemoteDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();
        if let Some(order) = &query.order_by {
            docs.sort_by_key(|doc| sort_key(&doc.fields, &order.field));
        }
        Ok(docs)
    }

    async fn create(&self, _collection: &str, fields: Document) -> Result<String, RemoteError> {
        let mut state = self.state();
        state.calls.creates += 1;
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }
        if let Some(limit) = state.creates_before_failure {
            if state.calls.creates > limit {
                return Err(RemoteError::Status {
                    code: 429,
                    status: "RESOURCE_EXHAUSTED".into(),
                    message: "quota exceeded".into(),
                });
            }
        }
        let id = next_id(&mut state);
        state.documents.insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(&self, _collection: &str, id: &str, fields: Document) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.updates += 1;
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }
        let doc = state
            .documents
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, _collection: &str, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.deletes += 1;
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }
        state
            .documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}
