//! Error types for the Chronicle core library.

use std::fmt;

use thiserror::Error;

/// Which kind of thing a [`ChronicleError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A player with no saves or no live session.
    Player,
    /// A save record.
    Save,
    /// A choice that is not among the available options.
    Choice,
    /// A live session in the session table.
    Session,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Save => write!(f, "save"),
            Self::Choice => write!(f, "choice"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Top-level error type for all Chronicle operations.
#[derive(Error, Debug)]
pub enum ChronicleError {
    /// The requested player, save, choice or session does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// What was being looked up.
        resource: Resource,
        /// The identifier that missed.
        id: String,
    },

    /// A persisted payload is structurally invalid and cannot be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The per-player save cap was violated after a write.
    #[error("Save cap violated for player {player}: limit {limit}, found {found}")]
    CapacityViolation {
        /// Owner of the saves.
        player: String,
        /// Configured cap.
        limit: usize,
        /// Number of saves actually present.
        found: usize,
    },

    /// The durable medium failed an operation. Never retried at this layer.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChronicleError {
    /// Shorthand for a [`ChronicleError::NotFound`].
    #[must_use]
    pub fn not_found(resource: Resource, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether this is a [`ChronicleError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for ChronicleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ChronicleError>;
