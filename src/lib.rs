//! # Rolodex - local contact manager core
//!
//! Persistence layer for a small desktop CRM.
//!
//! Rolodex provides:
//! - SQLite-backed profiles and a dated interaction log per profile
//! - Constraint enforcement (unique name triple, foreign keys, detail length)
//! - Duplicate detection ahead of profile creation
//! - Timestamped backups (page copy or SQL dump) with a retention window
//! - An async request bridge for a UI process, servable over stdio

pub mod storage;
pub mod models;
pub mod duplicate;
pub mod backup;
pub mod bridge;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use storage::{SqliteStore, Execution, Row, Value};
pub use models::{Profile, NewProfile, ProfileUpdate, Contact, NewContact, SortOrder};
pub use duplicate::{find_duplicate, DuplicateCandidate};
pub use backup::{BackupManager, BackupStrategy, PruneReport};
pub use bridge::{Bridge, Request, Response};

/// Result type alias for Rolodex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Rolodex operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid statement or parameters: {0}")]
    SyntaxOrBinding(String),

    #[error("Storage I/O failure: {0}")]
    StorageIo(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Store has been closed")]
    StoreClosed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backups are disabled in the configuration")]
    BackupDisabled,
}

/// Coarse error classification handed to callers across the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ConstraintViolation,
    SyntaxOrBinding,
    NotFound,
    IoFailure,
    InitializationFailure,
    StoreClosed,
    InvalidRequest,
    BackupDisabled,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Error::SyntaxOrBinding(_) => ErrorKind::SyntaxOrBinding,
            Error::StorageIo(_) | Error::Io(_) => ErrorKind::IoFailure,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Initialization(_) => ErrorKind::InitializationFailure,
            Error::StoreClosed => ErrorKind::StoreClosed,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::BackupDisabled => ErrorKind::BackupDisabled,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.kind() == ErrorKind::ConstraintViolation
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => Error::ConstraintViolation(err.to_string()),
                ErrorCode::Unknown => Error::SyntaxOrBinding(err.to_string()),
                ErrorCode::CannotOpen
                | ErrorCode::DiskFull
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt => Error::StorageIo(err.to_string()),
                _ => Error::Storage(err),
            },
            rusqlite::Error::SqlInputError { .. }
            | rusqlite::Error::InvalidParameterCount(_, _)
            | rusqlite::Error::InvalidParameterName(_)
            | rusqlite::Error::ExecuteReturnedResults
            | rusqlite::Error::MultipleStatement
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::InvalidQuery => Error::SyntaxOrBinding(err.to_string()),
            _ => Error::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_count_is_binding_error() {
        let err: Error = rusqlite::Error::InvalidParameterCount(1, 2).into();
        assert_eq!(err.kind(), ErrorKind::SyntaxOrBinding);
    }

    #[test]
    fn test_constraint_code_is_classified() {
        let failure = rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
        let err: Error = rusqlite::Error::SqliteFailure(failure, Some("UNIQUE".into())).into();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_malformed_sql_is_syntax_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: Error = conn.execute("INSER INTO t VALUES (1)", []).unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::SyntaxOrBinding, "got {err:?}");

        let err: Error = conn.prepare("SELEC 1").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::SyntaxOrBinding, "got {err:?}");
    }
}
