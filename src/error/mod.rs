//! Error types and result aliases for the discovery state core.
//!
//! The core never panics across its public boundary: every fallible
//! operation returns [`CoreResult`], and every error carries an
//! [`ErrorKind`] tag so request handlers can map failures to a
//! structured `{ success: false, message }` response without matching
//! on variant internals.

use thiserror::Error;

/// Coarse classification of a core failure.
///
/// Mirrors the retry semantics handlers care about: validation and
/// not-found are never retried, storage I/O is retry-at-caller's-option,
/// cancellation is a cooperative abort rather than a fault, and capacity
/// refusals are reported, not thrown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing caller input.
    Validation,
    /// A record the operation requires does not exist.
    NotFound,
    /// Underlying storage I/O failed.
    StorageIo,
    /// A stored record could not be parsed or a value could not be
    /// serialized.
    Serialization,
    /// The operation observed a cancellation request and aborted.
    Cancelled,
    /// A registration or admission limit was reached.
    Capacity,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::StorageIo => write!(f, "storage_io"),
            ErrorKind::Serialization => write!(f, "serialization"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Capacity => write!(f, "capacity"),
        }
    }
}

/// Core error type returned across the crate boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller input failed validation.
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// A required record is missing.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record namespace, e.g. "session" or "work item".
        kind: String,
        /// The id that was looked up.
        id: String,
    },

    /// Storage I/O failure, propagated unchanged from the backend.
    #[error("Storage I/O failed: {message}")]
    StorageIo {
        /// Description of the failing operation.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stored record was malformed or a value failed to serialize.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled cooperatively.
    #[error("Operation cancelled")]
    Cancelled,

    /// An admission limit (e.g. maximum registered agents) was reached.
    #[error("Capacity exceeded: {message}")]
    Capacity {
        /// Which limit was hit.
        message: String,
    },
}

impl CoreError {
    /// The coarse classification tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation { .. } => ErrorKind::Validation,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::StorageIo { .. } => ErrorKind::StorageIo,
            CoreError::Serialization(_) => ErrorKind::Serialization,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::Capacity { .. } => ErrorKind::Capacity,
        }
    }

    /// Build a validation error from any displayable message.
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    /// Build a not-found error for a record namespace and id.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Wrap an I/O error with operation context.
    pub fn storage_io(message: impl Into<String>, source: std::io::Error) -> Self {
        CoreError::StorageIo {
            message: message.into(),
            source,
        }
    }

    /// True when the error represents a cooperative cancellation rather
    /// than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
