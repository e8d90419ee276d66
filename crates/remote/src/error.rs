use thiserror::Error;

/// Failures talking to the remote document database.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The database refused the query shape, typically for a missing index.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("remote returned {code} {status}: {message}")]
    Status {
        code: u16,
        status: String,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failures reading the legacy provider.
#[derive(Debug, Clone, Error)]
pub enum LegacyError {
    #[error("invalid legacy credentials: {0}")]
    InvalidCredentials(String),

    #[error("legacy provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("legacy request failed: {0}")]
    Transport(String),

    #[error("legacy response malformed: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LegacyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failures of explicit, user-initiated authentication calls.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("email and password are required")]
    MissingCredentials,

    #[error("no signed-in session")]
    SignedOut,

    #[error("session has no refresh token")]
    NoRefreshToken,

    #[error("authentication rejected: {0}")]
    Rejected(String),

    #[error("authentication request failed: {0}")]
    Transport(String),

    #[error("authentication response malformed: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
