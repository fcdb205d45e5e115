//! Common error types for clipcat

use thiserror::Error;

/// Common result type for clipcat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the catalog, the registry and the ingestion workflow
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A prefix mapping required for allocation is missing.
    ///
    /// Raised when the `generic` fallback is absent, which means the registry
    /// was never set up.
    #[error("Prefix mapping not found: {0}")]
    RegistryNotFound(String),

    /// Reference matches neither a clip identifier nor a clip name
    #[error("Cannot find a clip with reference '{0}'")]
    ClipNotFound(String),

    /// Untag requested for a tag the clip does not carry
    #[error("Clip '{reference}' is not tagged '{tag}'")]
    TagNotPresent { reference: String, tag: String },

    /// Catalog and filesystem disagree after a failed ingestion step
    #[error("Ingestion of '{file}' left catalog and filesystem out of sync: {reason}")]
    IngestionPartialFailure { file: String, reason: String },
}
