//! Error types for the recovery library.
//!
//! This module defines all error types that can occur while extracting
//! encryption parameters, starting a session, or persisting its state.

/// Result type alias for recovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during password recovery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// No trailer dictionary could be located
    #[error("Trailer information not found")]
    TrailerNotFound,

    /// A trailer was found but it does not reference an encryption dictionary
    #[error("Trailer has no /Encrypt reference")]
    EncryptRefNotFound,

    /// A trailer was found but it carries no /ID array
    #[error("Trailer has no /ID file identifier")]
    FileIdNotFound,

    /// The referenced encryption object is missing from the file
    #[error("Encryption object {0} not found")]
    EncryptObjectNotFound(u32),

    /// The document does not use encryption at all
    #[error("Document is not encrypted")]
    NotEncrypted,

    /// Security handler other than Standard
    #[error("Unsupported security handler: {0}")]
    UnsupportedHandler(String),

    /// Required entry missing from the encryption dictionary
    #[error("Encryption dictionary missing /{0}")]
    MissingField(&'static str),

    /// Revision outside the RC4 Standard Security Handler (2 and 3)
    #[error("Unsupported security handler revision: R={0}")]
    UnsupportedRevision(u32),

    /// An externally supplied password did not authenticate
    #[error("Supplied password does not match the document")]
    PasswordRejected,

    /// Checkpoint was written for another document or is inconsistent
    #[error("Checkpoint does not match document: {0}")]
    CheckpointMismatch(String),

    /// Checkpoint content could not be decoded
    #[error("Invalid checkpoint: {0}")]
    Checkpoint(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
