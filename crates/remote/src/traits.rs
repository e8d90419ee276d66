use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use contactbook_core::{Document, Identity, SubscriptionId};

use crate::error::{LegacyError, RemoteError};

/// Collection holding one document per contact.
pub const CONTACTS_COLLECTION: &str = "contacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Read of an entire collection, optionally ordered server-side by one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ordered_by(field: impl Into<String>) -> Self {
        Self {
            order_by: Some(OrderBy {
                field: field.into(),
                direction: Direction::Ascending,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Document,
}

#[async_trait]
pub trait RemoteDatabase: Send + Sync {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Create a document and return the identifier the database assigned.
    async fn create(&self, collection: &str, fields: Document) -> Result<String, RemoteError>;

    /// Merge `fields` into an existing document. Fails if it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), RemoteError>;

    /// Delete an existing document. Fails if it does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

pub type IdentityListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Identity state of the remote substrate. There is no way to
/// create credentials through this trait.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Register a listener for identity changes. Once the provider knows the
    /// session state it calls the listener with it, and again on every change.
    fn subscribe(&self, listener: IdentityListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Connection parameters for the legacy provider. Supplied per migration run
/// and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct LegacyCredentials {
    pub url: String,
    pub key: String,
}

impl LegacyCredentials {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
        }
    }
}

impl fmt::Debug for LegacyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait LegacySource: Send + Sync {
    /// Every row of the legacy contacts table, legacy id column included.
    async fn fetch_all(&self) -> Result<Vec<Document>, LegacyError>;
}

pub trait LegacyConnector: Send + Sync {
    fn connect(&self, credentials: &LegacyCredentials) -> Result<Box<dyn LegacySource>, LegacyError>;
}
