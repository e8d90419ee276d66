use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use contactbook_core::Document;
use contactbook_remote::{CONTACTS_COLLECTION, LegacyConnector, LegacyCredentials, RemoteDatabase};
use futures::future::try_join_all;

use crate::auth::AuthGate;
use crate::config::AppConfig;
use crate::error::MigrationError;

/// Progress is reported after every this many completed writes.
pub const PROGRESS_INTERVAL: usize = 5;

pub const EMPTY_MESSAGE: &str = "No contacts found in legacy provider to migrate.";
pub const COMPLETED_MESSAGE: &str = "Migration completed successfully!";

const LEGACY_ID_FIELD: &str = "id";

/// Receives human-readable progress lines.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub success: bool,
    pub count: usize,
    pub message: String,
}

/// Copies every record of the legacy provider into the configured remote
/// database. The run is all-or-nothing from the caller's view: the first
/// failed write fails it, even though writes that already landed stay.
pub struct Migrator {
    gate: AuthGate,
    destination: Option<Arc<dyn RemoteDatabase>>,
    connector: Arc<dyn LegacyConnector>,
}

impl Migrator {
    pub fn new(
        config: &AppConfig,
        gate: AuthGate,
        destination: Option<Arc<dyn RemoteDatabase>>,
        connector: Arc<dyn LegacyConnector>,
    ) -> Self {
        Self {
            gate,
            destination: destination.filter(|_| config.remote_configured()),
            connector,
        }
    }

    pub async fn migrate(
        &self,
        credentials: &LegacyCredentials,
        progress: &dyn ProgressSink,
    ) -> Result<MigrationReport, MigrationError> {
        let destination = self.destination.as_deref().ok_or(MigrationError::NotConfigured)?;

        progress.report("Authenticating with remote database...");
        if self.gate.ensure_identity().await.is_none() {
            tracing::warn!("migrating without an identity; writes may be rejected");
        }

        progress.report("Connecting to legacy provider...");
        let source = self.connector.connect(credentials)?;

        progress.report("Fetching contacts from legacy provider...");
        let rows = source.fetch_all().await?;
        if rows.is_empty() {
            tracing::info!("legacy provider has no contacts");
            return Ok(MigrationReport {
                success: true,
                count: 0,
                message: EMPTY_MESSAGE.to_string(),
            });
        }

        let total = rows.len();
        progress.report(&format!("Found {total} contacts. Starting import..."));

        let completed = AtomicUsize::new(0);
        let writes = rows.into_iter().map(|row| {
            let completed = &completed;
            async move {
                destination
                    .create(CONTACTS_COLLECTION, strip_legacy_id(row))
                    .await
                    .map_err(MigrationError::Write)?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if done % PROGRESS_INTERVAL == 0 {
                    progress.report(&format!("Imported {done}/{total}..."));
                }
                Ok::<_, MigrationError>(())
            }
        });
        if let Err(e) = try_join_all(writes).await {
            tracing::error!(
                error = %e,
                written = completed.load(Ordering::SeqCst),
                total,
                "migration aborted"
            );
            return Err(e);
        }

        let count = completed.load(Ordering::SeqCst);
        tracing::info!(count, "migration finished");
        progress.report(COMPLETED_MESSAGE);
        Ok(MigrationReport {
            success: true,
            count,
            message: COMPLETED_MESSAGE.to_string(),
        })
    }
}

/// The destination assigns its own identifiers.
fn strip_legacy_id(mut row: Document) -> Document {
    row.remove(LEGACY_ID_FIELD);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_id_is_removed_and_other_fields_kept() {
        let row = json!({"id": 7, "name": "Amy", "nickname": "A"});
        let serde_json::Value::Object(row) = row else { unreachable!() };
        let stripped = strip_legacy_id(row);
        assert!(!stripped.contains_key("id"));
        assert_eq!(stripped.get("nickname"), Some(&json!("A")));
    }

    #[test]
    fn closures_are_progress_sinks() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |msg: &str| seen.lock().unwrap().push(msg.to_string());
        sink.report("hello");
        assert_eq!(seen.lock().unwrap().as_slice(), ["hello"]);
    }
}
