//! # Error Types
//!
//! Structured error types for cable_core. Errors serialize to JSON so a form,
//! an API client or an LLM tool call can tell an incomplete input apart from a
//! broken lookup database or a failed file operation.
//!
//! Two layers exist:
//!
//! - [`CalcError`] for everything a caller has to react to.
//! - [`NotFound`] for a single missing table entry. The section search treats
//!   it as "skip this candidate", so it never becomes a `CalcError` there.
//!
//! ## Example
//!
//! ```rust
//! use cable_core::errors::{CalcError, CalcResult};
//!
//! fn validate_length(length_m: f64) -> CalcResult<()> {
//!     if length_m <= 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "length_m",
//!             length_m.to_string(),
//!             "Length must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_length(-1.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for cable_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Result of a single table lookup
pub type LookupResult<T> = Result<T, NotFound>;

/// Structured error type for sizing operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// An input value is invalid (out of range, non-positive, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A whole lookup scope is absent from the database
    #[error("Table not found: {scope}")]
    TableNotFound { scope: String },

    /// The database contains malformed keys or values
    #[error("Invalid table '{table}': {reason}")]
    InvalidTable { table: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON/TOML serialization or deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a TableNotFound error
    pub fn table_not_found(scope: impl Into<String>) -> Self {
        CalcError::TableNotFound { scope: scope.into() }
    }

    /// Create an InvalidTable error
    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        CalcError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        CalcError::SerializationError { reason: reason.into() }
    }

    /// True when the caller should treat this as an incomplete form rather
    /// than a computation failure.
    pub fn is_input_error(&self) -> bool {
        matches!(self, CalcError::InvalidInput { .. })
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CalcError::FileLocked { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::TableNotFound { .. } => "TABLE_NOT_FOUND",
            CalcError::InvalidTable { .. } => "INVALID_TABLE",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

/// Which table a lookup missed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Ampacity,
    Impedance,
}

/// A table has no entry for the requested key.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("no {table:?} entry for {key}")]
pub struct NotFound {
    pub table: TableKind,
    pub key: String,
}

impl NotFound {
    pub fn ampacity(key: impl Into<String>) -> Self {
        NotFound {
            table: TableKind::Ampacity,
            key: key.into(),
        }
    }

    pub fn impedance(key: impl Into<String>) -> Self {
        NotFound {
            table: TableKind::Impedance,
            key: key.into(),
        }
    }
}

impl From<NotFound> for CalcError {
    fn from(missing: NotFound) -> Self {
        CalcError::table_not_found(missing.to_string())
    }
}
