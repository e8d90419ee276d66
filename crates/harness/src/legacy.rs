use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use contactbook_core::Document;
use contactbook_remote::{LegacyConnector, LegacyCredentials, LegacyError, LegacySource};

/// Legacy provider backed by a fixed set of rows.
#[derive(Default)]
pub struct MemoryLegacy {
    rows: Vec<Document>,
    connect_failure: Option<LegacyError>,
    fetch_failure: Option<LegacyError>,
    connects: AtomicUsize,
    last_credentials: Mutex<Option<LegacyCredentials>>,
}

impl MemoryLegacy {
    pub fn with_rows(rows: Vec<Document>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing_connect(err: LegacyError) -> Self {
        Self {
            connect_failure: Some(err),
            ..Self::default()
        }
    }

    pub fn failing_fetch(err: LegacyError) -> Self {
        Self {
            fetch_failure: Some(err),
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_credentials(&self) -> Option<LegacyCredentials> {
        self.last_credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LegacyConnector for MemoryLegacy {
    fn connect(&self, credentials: &LegacyCredentials) -> Result<Box<dyn LegacySource>, LegacyError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_credentials.lock().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        if let Some(err) = &self.connect_failure {
            return Err(err.clone());
        }
        Ok(Box::new(MemoryLegacySource {
            rows: self.rows.clone(),
            failure: self.fetch_failure.clone(),
        }))
    }
}

pub struct MemoryLegacySource {
    rows: Vec<Document>,
    failure: Option<LegacyError>,
}

#[async_trait]
impl LegacySource for MemoryLegacySource {
    async fn fetch_all(&self) -> Result<Vec<Document>, LegacyError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.rows.clone()),
        }
    }
}
