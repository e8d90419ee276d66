use std::path::{Path, PathBuf};

use contactbook_core::Identity;
use contactbook_remote::{AuthConfig, FirestoreConfig};
use contactbook_storage::BlobStore;

use crate::error::ConfigError;

pub const LOCAL_DB_FILE: &str = "contactbook.db";
pub const SESSION_KEY: &str = "auth.session";

const KEY_API_KEY: &str = "remote.api_key";
const KEY_PROJECT_ID: &str = "remote.project_id";
const KEY_APP_ID: &str = "remote.app_id";
const KEY_AUTH_DOMAIN: &str = "remote.auth_domain";
const KEY_STORAGE_BUCKET: &str = "remote.storage_bucket";
const KEY_MESSAGING_SENDER_ID: &str = "remote.messaging_sender_id";

const ALL_KEYS: [&str; 6] = [
    KEY_API_KEY,
    KEY_PROJECT_ID,
    KEY_APP_ID,
    KEY_AUTH_DOMAIN,
    KEY_STORAGE_BUCKET,
    KEY_MESSAGING_SENDER_ID,
];

/// Connection parameters for the remote document database.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RemoteConfig {
    pub api_key: String,
    pub project_id: String,
    pub app_id: String,
    pub auth_domain: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("project_id", &self.project_id)
            .field("app_id", &self.app_id)
            .field("auth_domain", &self.auth_domain)
            .finish_non_exhaustive()
    }
}

impl RemoteConfig {
    /// Read persisted settings. `None` unless all three required keys exist.
    pub fn load(store: &dyn BlobStore) -> Result<Option<Self>, ConfigError> {
        let read = |key: &str| -> Result<Option<String>, ConfigError> {
            Ok(store.read(key)?.filter(|v| !v.trim().is_empty()))
        };
        let (Some(api_key), Some(project_id), Some(app_id)) =
            (read(KEY_API_KEY)?, read(KEY_PROJECT_ID)?, read(KEY_APP_ID)?)
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            api_key,
            project_id,
            app_id,
            auth_domain: read(KEY_AUTH_DOMAIN)?,
            storage_bucket: read(KEY_STORAGE_BUCKET)?,
            messaging_sender_id: read(KEY_MESSAGING_SENDER_ID)?,
        }))
    }

    /// Trim every value and check the required ones.
    pub fn normalized(self) -> Result<Self, ConfigError> {
        let required = |value: String, field: &'static str| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(ConfigError::MissingField(field))
            } else {
                Ok(value)
            }
        };
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(Self {
            api_key: required(self.api_key, "API key")?,
            project_id: required(self.project_id, "project ID")?,
            app_id: required(self.app_id, "app ID")?,
            auth_domain: optional(self.auth_domain),
            storage_bucket: optional(self.storage_bucket),
            messaging_sender_id: optional(self.messaging_sender_id),
        })
    }

    pub fn firestore(&self) -> FirestoreConfig {
        FirestoreConfig::new(&self.project_id, &self.api_key)
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig::new(&self.api_key)
    }
}

/// Validate and persist remote settings. They take effect on the next start.
pub fn save_remote_config(store: &dyn BlobStore, config: RemoteConfig) -> Result<RemoteConfig, ConfigError> {
    let config = config.normalized()?;
    store.write(KEY_API_KEY, &config.api_key)?;
    store.write(KEY_PROJECT_ID, &config.project_id)?;
    store.write(KEY_APP_ID, &config.app_id)?;
    let optional = [
        (KEY_AUTH_DOMAIN, &config.auth_domain),
        (KEY_STORAGE_BUCKET, &config.storage_bucket),
        (KEY_MESSAGING_SENDER_ID, &config.messaging_sender_id),
    ];
    for (key, value) in optional {
        match value {
            Some(value) => store.write(key, value)?,
            None => store.remove(key)?,
        }
    }
    tracing::info!(project_id = %config.project_id, "remote settings saved");
    Ok(config)
}

pub fn clear_remote_config(store: &dyn BlobStore) -> Result<(), ConfigError> {
    for key in ALL_KEYS {
        store.remove(key)?;
    }
    store.remove(SESSION_KEY)?;
    tracing::info!("remote settings cleared");
    Ok(())
}

pub fn load_session(store: &dyn BlobStore) -> Result<Option<Identity>, ConfigError> {
    match store.read(SESSION_KEY)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ConfigError::Session(e.to_string())),
        None => Ok(None),
    }
}

pub fn save_session(store: &dyn BlobStore, identity: Option<&Identity>) -> Result<(), ConfigError> {
    match identity {
        Some(identity) => {
            let raw = serde_json::to_string(identity).map_err(|e| ConfigError::Session(e.to_string()))?;
            store.write(SESSION_KEY, &raw)?;
        }
        None => store.remove(SESSION_KEY)?,
    }
    Ok(())
}

/// Process-wide configuration, built once at startup and handed to every
/// component that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host_dir: Option<PathBuf>,
    pub remote: Option<RemoteConfig>,
}

impl AppConfig {
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            host_dir: None,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_host_dir(mut self, host_dir: impl Into<PathBuf>) -> Self {
        self.host_dir = Some(host_dir.into());
        self
    }

    /// Backend selection state: fixed for the life of the process.
    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local_db_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_DB_FILE)
    }

    pub fn host_dir(&self) -> Option<&Path> {
        self.host_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactbook_storage::SqliteBlobStore;

    fn sample() -> RemoteConfig {
        RemoteConfig {
            api_key: " key ".into(),
            project_id: "proj".into(),
            app_id: "app".into(),
            auth_domain: Some("proj.firebaseapp.com".into()),
            storage_bucket: Some("   ".into()),
            messaging_sender_id: None,
        }
    }

    #[test]
    fn unconfigured_store_loads_none() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteBlobStore::open_in_memory()?;
        assert_eq!(RemoteConfig::load(&store)?, None);
        Ok(())
    }

    #[test]
    fn save_trims_and_roundtrips() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteBlobStore::open_in_memory()?;
        let saved = save_remote_config(&store, sample())?;
        assert_eq!(saved.api_key, "key");
        assert_eq!(saved.storage_bucket, None);
        assert_eq!(RemoteConfig::load(&store)?, Some(saved));
        assert_eq!(store.read(KEY_STORAGE_BUCKET)?, None);
        Ok(())
    }

    #[test]
    fn save_rejects_missing_required_fields() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteBlobStore::open_in_memory()?;
        let mut config = sample();
        config.app_id = "  ".into();
        assert!(matches!(
            save_remote_config(&store, config),
            Err(ConfigError::MissingField("app ID"))
        ));
        assert_eq!(store.read(KEY_API_KEY)?, None);
        Ok(())
    }

    #[test]
    fn clear_removes_settings_and_session() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteBlobStore::open_in_memory()?;
        save_remote_config(&store, sample())?;
        save_session(&store, Some(&Identity::new("u1")))?;
        clear_remote_config(&store)?;
        assert_eq!(RemoteConfig::load(&store)?, None);
        assert_eq!(load_session(&store)?, None);
        Ok(())
    }

    #[test]
    fn debug_hides_api_key() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("key "));
        assert!(rendered.contains("proj"));
    }

    #[test]
    fn remote_configured_follows_remote_settings() {
        let local = AppConfig::local("/tmp/x");
        assert!(!local.remote_configured());
        assert!(local.clone().with_remote(sample()).remote_configured());
        assert_eq!(local.local_db_path(), PathBuf::from("/tmp/x").join(LOCAL_DB_FILE));
    }
}
