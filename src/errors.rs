//! Error types for the merlion note store.
//!
//! Every failure surfaced by a backend, the credential store or the manager
//! is a [`MerlionError`]. Callers that need to branch on the failure class
//! (e.g. "show a login prompt" vs. "show a not-found toast") should match on
//! [`MerlionError::kind`] rather than on individual variants.

use std::{fmt, io, path::PathBuf};

use log::error;
use thiserror::Error;

/// The main error type for the merlion application.
#[derive(Error, Debug)]
pub enum MerlionError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to JSON serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The header block of a file note could not be read or written.
    #[error("Header error: {0}")]
    Header(#[from] serde_yaml::Error),

    /// Errors reported by the embedded database.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A migration script could not be applied, or is badly named.
    #[error("Migration {file}: {message}")]
    Migration { file: String, message: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Note with the same ID already exists.
    #[error("Note already exists: {id}")]
    NoteAlreadyExists { id: String },

    /// Invalid note title or request content.
    #[error("Invalid note: {message}")]
    InvalidNote { message: String },

    /// Stored data could not be interpreted.
    #[error("Invalid note format: {message}")]
    InvalidFormat { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// No credentials were supplied, or the supplied ones are empty.
    #[error("Missing credentials: {message}")]
    MissingCredentials { message: String },

    /// Credentials could not be encrypted or decrypted.
    #[error("Credential store error: {message}")]
    CredentialStore { message: String },

    /// The remote service rejected the login or the session.
    #[error("Authentication failed: {message}")]
    Unauthorized { status: Option<u16>, message: String },

    /// The remote service answered with a status >= 400.
    #[error("API error: {body} (status: {status})")]
    Api { status: u16, body: String },

    /// The remote service could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },
}

/// Coarse failure classes, stable across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Validation,
    Auth,
    Transport,
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Transport => "transport",
            ErrorKind::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

impl MerlionError {
    /// Classifies the error into the taxonomy shared by all backends.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MerlionError::NoteNotFound { .. } => ErrorKind::NotFound,
            MerlionError::NoteAlreadyExists { .. } => ErrorKind::AlreadyExists,
            MerlionError::InvalidNote { .. }
            | MerlionError::ConfigError { .. }
            | MerlionError::MissingCredentials { .. } => ErrorKind::Validation,
            MerlionError::Unauthorized { .. } => ErrorKind::Auth,
            MerlionError::Api { .. } | MerlionError::Transport(_) => ErrorKind::Transport,
            MerlionError::Io(_)
            | MerlionError::Serialization(_)
            | MerlionError::Header(_)
            | MerlionError::Database(_)
            | MerlionError::Migration { .. }
            | MerlionError::InvalidFormat { .. }
            | MerlionError::DirectoryError { .. }
            | MerlionError::CredentialStore { .. }
            | MerlionError::ApplicationError { .. }
            | MerlionError::LockAcquisitionFailed { .. } => ErrorKind::Persistence,
        }
    }

    /// HTTP status carried by remote failures, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            MerlionError::Api { status, .. } => Some(*status),
            MerlionError::Unauthorized { status, .. } => *status,
            MerlionError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Aborts on a broken manager invariant.
///
/// These are programming errors in the caller, never runtime conditions, so
/// there is no error value for them.
#[track_caller]
pub fn invariant_violation(message: &str) -> ! {
    error!("Invariant violation: {}", message);
    panic!("invariant violation: {}", message);
}
