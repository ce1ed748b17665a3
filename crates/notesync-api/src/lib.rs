use serde::{Deserialize, Serialize};

pub mod note;
pub mod session;
pub mod streaming;

// Re-export note types
pub use note::{NoteItem, NoteRecord, RecordId};

// Re-export session types
pub use session::{AuthEvent, AuthSession, AuthState, SessionState};

// Re-export streaming types
pub use streaming::{ControllerEvent, StoreEvent};

/// Failure reported by the remote CRUD backend.
///
/// Every gateway operation is asynchronous, so these are always delivered
/// as the `Err` side of a completed future, never raised synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GatewayError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Unknown gateway error: {message}")]
    Unknown { message: String },
}

impl GatewayError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }
}

/// Errors from the local collection store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid position {position} for collection of {len} items")]
    InvalidPosition { position: usize, len: usize },

    #[error("Collection store is closed")]
    Closed,
}

/// Local validation performed before anything is submitted remotely.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Required field is empty: {field}")]
    EmptyField { field: &'static str },
}

/// Umbrella error returned by the UI-facing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Background write dropped before completing")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SyncError>;
