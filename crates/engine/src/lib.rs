pub mod auth;
pub mod config;
pub mod error;
pub mod migration;
pub mod store;

pub use auth::AuthGate;
pub use config::{AppConfig, RemoteConfig, clear_remote_config, load_session, save_remote_config, save_session};
pub use error::{ConfigError, MigrationError, Mutation, MutationFailure, StoreError, WriteFailure};
pub use migration::{MigrationReport, Migrator, ProgressSink};
pub use store::{ContactStore, RemoteHandles, StoreSnapshot, StoreStatus};
