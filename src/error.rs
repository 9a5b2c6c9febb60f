use thiserror::Error;

/// Main error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True for the not-found sentinel, so callers can branch on existence
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StorageError::Cancelled)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::InvalidResponse(e.to_string())
    }
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
