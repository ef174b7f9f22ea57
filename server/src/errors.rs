use rusoto_core::RusotoError;
use rusoto_s3::{DeleteObjectError, PutObjectError};
use thiserror::Error;
use uuid::Uuid;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Represents an SQL error.
    #[error("database error")]
    Sqlx { source: sqlx::Error },

    /// Represents a failure while hashing or verifying a password.
    #[error("could not process password")]
    PasswordHashing(String),

    /// Represents a failure while uploading to the object store.
    #[error("could not save file")]
    UploadFailed { source: RusotoError<PutObjectError> },

    /// Represents a failure while deleting from the object store.
    #[error("could not delete file")]
    DeleteFailed { source: RusotoError<DeleteObjectError> },

    /// Represents a failure of the in-memory store used in tests.
    #[error("file store unavailable")]
    StoreUnavailable,

    /// Represents a failure to build the public URL of a stored file.
    #[error("could not generate URL")]
    FailedToGenerateUrl { source: url::ParseError },

    /// Represents a multipart submission that could not be read.
    #[error("malformed form submission")]
    MalformedFormSubmission,

    /// Represents JSON metadata that could not be parsed.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(#[source] serde_json::Error),

    /// Represents a submission missing one of its parts.
    #[error("invalid data: missing parts")]
    PartsMissing,

    /// Represents a required field that was blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Represents an email address without the expected shape.
    #[error("invalid email address")]
    InvalidEmail,

    /// Represents a password below the minimum length.
    #[error("password must have at least {0} characters")]
    PasswordTooShort(usize),

    /// Represents a password and confirmation that differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Represents a registration submitted without accepting the terms.
    #[error("terms of use must be accepted")]
    TermsNotAccepted,

    /// Represents a file above the size ceiling.
    #[error("file {field} has {size} bytes, more than the maximum of {limit}")]
    FileTooLarge {
        field: String,
        size: usize,
        limit: usize,
    },

    /// Represents a file whose content type isn’t accepted for its field.
    #[error("unsupported file type {content_type} for {field}")]
    UnsupportedFileType { field: String, content_type: String },

    /// Represents a string that isn’t a valid ID.
    #[error("invalid ID {0}")]
    InvalidId(String),

    /// Represents an ID that doesn’t match any registrant.
    #[error("no registrant with ID {0}")]
    NonExistentId(Uuid),

    /// Represents a registration with an email that already has an account.
    #[error("email already registered")]
    EmailAlreadyRegistered,

    /// Represents a failed sign-in.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Represents a request that needs an identity but carries none.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Represents a bearer token that is malformed, unknown or expired.
    #[error("invalid session")]
    InvalidSession,

    /// Represents an authenticated request lacking the administrator role.
    #[error("not authorized")]
    Forbidden,

    /// Represents a moderation action issued without confirmation.
    #[error("confirmation required")]
    ConfirmationRequired,
}
