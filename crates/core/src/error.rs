use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("name is required")]
    MissingName,

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
