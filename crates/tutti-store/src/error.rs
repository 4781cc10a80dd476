use thiserror::Error;

/// Failure reported by a remote collaborator (realtime store or object storage).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The store refused access to the path.
    #[error("Permission denied on {0}")]
    PermissionDenied(String),

    /// The store could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Object storage failure (upload, missing object, ...).
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend error: {0}")]
    Other(String),
}

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No account is signed in.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Nothing is stored at the requested path.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Connectivity, permission or unknown backend failure.
    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),

    /// A single entity was present but could not be decoded.
    #[error("Malformed entity at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// Write input rejected before reaching the backend.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Local file access (uploads).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        StoreError::NotFound { path: path.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
