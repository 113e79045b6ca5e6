use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A referenced document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A create targeted an id that is already taken.
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// A persisted document is missing or mistypes a required field.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The store's internal lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
