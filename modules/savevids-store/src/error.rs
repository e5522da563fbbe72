use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document not found: {collection}/{key}")]
    NotFound { collection: String, key: String },

    #[error("field {field} of {collection}/{key} is not an integer")]
    NotAnInteger {
        collection: String,
        key: String,
        field: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Connection-level failures may clear up on their own. Missing documents,
    /// malformed data and constraint violations will not.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
            StoreError::Unavailable(_) => true,
            StoreError::Serialization(_)
            | StoreError::NotFound { .. }
            | StoreError::NotAnInteger { .. } => false,
        }
    }

    pub(crate) fn not_found(collection: &str, key: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }
}
