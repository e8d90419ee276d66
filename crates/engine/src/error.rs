use std::fmt;

use contactbook_core::{ContactDraft, ContactId, ContactPatch, CoreError};
use contactbook_remote::{LegacyError, RemoteError};
use contactbook_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("saved session is unreadable: {0}")]
    Session(String),
}

/// The change a caller asked for, echoed back when its write fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Add {
        draft: ContactDraft,
        local_id: Option<ContactId>,
    },
    Update {
        id: ContactId,
        patch: ContactPatch,
    },
    Delete {
        id: ContactId,
    },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { draft, .. } => write!(f, "add of {:?}", draft.name),
            Self::Update { id, .. } => write!(f, "update of {id}"),
            Self::Delete { id } => write!(f, "delete of {id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("local save failed")]
    LocalSave,

    #[error("no authenticated identity")]
    Unauthenticated,

    #[error("remote write failed: {0}")]
    Remote(#[from] RemoteError),
}

/// A substrate write that did not land. When `applied_locally` is set the
/// in-memory collection already reflects `mutation` and now disagrees with
/// the substrate until the next reload.
#[derive(Debug, Error)]
#[error("{mutation} failed: {cause}")]
pub struct MutationFailure {
    pub mutation: Mutation,
    pub applied_locally: bool,
    #[source]
    pub cause: WriteFailure,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote database is configured but no remote handles were supplied")]
    MissingRemote,

    #[error("invalid contact: {0}")]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Mutation(#[from] Box<MutationFailure>),
}

impl StoreError {
    /// Whether memory and substrate now disagree.
    pub fn diverged(&self) -> bool {
        matches!(self, Self::Mutation(failure) if failure.applied_locally)
    }

    pub fn failure(&self) -> Option<&MutationFailure> {
        match self {
            Self::Mutation(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("remote database is not configured; save remote settings first")]
    NotConfigured,

    #[error("migration failed: {0}")]
    Source(#[from] LegacyError),

    #[error("migration failed: {0}")]
    Write(#[source] RemoteError),
}
