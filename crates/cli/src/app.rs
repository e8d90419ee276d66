use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use contactbook_engine::{
    AppConfig, AuthGate, ContactStore, Migrator, RemoteConfig, RemoteHandles, load_session,
    save_session,
};
use contactbook_remote::{
    AuthError, AuthSession, FirestoreClient, IdentityProvider, RemoteDatabase, SupabaseConnector,
};
use contactbook_storage::{HostChannel, PersistenceAdapter, SqliteBlobStore};

/// Everything a command needs, built once per process from the data
/// directory. Remote settings are read here and nowhere else.
pub struct App {
    pub config: AppConfig,
    pub blobs: Arc<SqliteBlobStore>,
    pub session: Option<Arc<AuthSession>>,
    database: Option<Arc<dyn RemoteDatabase>>,
}

/// Swap the restored ID token for a fresh one and persist it. A refresh
/// token the server no longer accepts ends the session; a network failure
/// keeps the restored one so offline commands still work.
async fn renew_session(session: &AuthSession, blobs: &SqliteBlobStore) {
    match session.refresh().await {
        Ok(identity) => {
            if let Err(e) = save_session(blobs, Some(&identity)) {
                tracing::warn!(error = %e, "could not persist refreshed session");
            }
        }
        Err(AuthError::Rejected(reason)) => {
            tracing::warn!(%reason, "saved session expired; signing out");
            session.sign_out();
            if let Err(e) = save_session(blobs, None) {
                tracing::warn!(error = %e, "could not clear expired session");
            }
        }
        Err(e) => tracing::warn!(error = %e, "session refresh failed; using saved token"),
    }
}

impl App {
    pub async fn open(data_dir: PathBuf, host_dir: Option<PathBuf>) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let mut config = AppConfig::local(data_dir);
        if let Some(host_dir) = host_dir {
            config = config.with_host_dir(host_dir);
        }
        let blobs = Arc::new(
            SqliteBlobStore::open(config.local_db_path()).context("opening local database")?,
        );
        if let Some(remote) = RemoteConfig::load(blobs.as_ref()).context("reading remote settings")? {
            config = config.with_remote(remote);
        }

        let (session, database) = match &config.remote {
            Some(remote) => {
                let session = Arc::new(AuthSession::new(remote.auth()));
                let restored = load_session(blobs.as_ref()).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ignoring saved session");
                    None
                });
                let refreshable = restored.as_ref().is_some_and(|i| i.refresh_token.is_some());
                session.settle(restored);
                if refreshable {
                    renew_session(&session, blobs.as_ref()).await;
                }
                let identity: Arc<dyn IdentityProvider> = session.clone();
                let database: Arc<dyn RemoteDatabase> =
                    Arc::new(FirestoreClient::new(&remote.firestore(), identity));
                (Some(session), Some(database))
            }
            None => (None, None),
        };

        tracing::info!(
            data_dir = %config.data_dir.display(),
            remote = config.remote_configured(),
            "contactbook ready"
        );
        Ok(Self {
            config,
            blobs,
            session,
            database,
        })
    }

    pub fn adapter(&self) -> PersistenceAdapter {
        let host = HostChannel::probe(self.config.host_dir());
        PersistenceAdapter::select(self.blobs.clone(), host.as_ref())
    }

    pub fn gate(&self) -> AuthGate {
        let provider = self
            .session
            .clone()
            .map(|session| session as Arc<dyn IdentityProvider>);
        AuthGate::new(&self.config, provider)
    }

    fn handles(&self) -> Option<RemoteHandles> {
        self.database
            .clone()
            .map(|database| RemoteHandles::new(self.gate(), database))
    }

    pub async fn store(&self) -> Result<ContactStore> {
        ContactStore::open(&self.config, self.adapter(), self.handles())
            .await
            .context("opening contact store")
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(
            &self.config,
            self.gate(),
            self.database.clone(),
            Arc::new(SupabaseConnector::new()),
        )
    }

    pub fn require_session(&self) -> Result<&AuthSession> {
        self.session
            .as_deref()
            .context("remote database is not configured; run `contactbook remote set` first")
    }
}
