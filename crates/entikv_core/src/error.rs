//! Error types for the EntiKV storage engine.

use thiserror::Error;

/// Result type for storage engine operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage engine operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A caller supplied an argument the operation cannot accept, such as an
    /// empty key or a null record id on a mutating call.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// The named record, index entry, namespace, or session does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The record, namespace, or index is already registered.
    #[error("already exists: {what}")]
    AlreadyExists {
        /// What was being created.
        what: String,
    },

    /// A unique index already holds an entry for the application key.
    #[error("unique constraint violation: key {key} already exists")]
    UniqueConstraintViolation {
        /// Hex rendering of the duplicate application key.
        key: String,
    },

    /// A transaction or session lifecycle call arrived out of sequence.
    #[error("invalid transaction state: {message}")]
    TransactionState {
        /// Description of the sequencing violation.
        message: String,
    },

    /// The engine's session pool is exhausted.
    #[error("session limit exceeded: at most {limit} concurrent sessions")]
    SessionLimitExceeded {
        /// The configured maximum number of sessions.
        limit: usize,
    },

    /// The engine has not been started, or has been stopped.
    #[error("engine is not running")]
    EngineNotRunning,
}

impl StorageError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Creates a unique constraint violation for the given application key.
    pub fn unique_violation(key: &[u8]) -> Self {
        let mut rendered = String::with_capacity(2 + key.len() * 2);
        rendered.push_str("0x");
        for byte in key {
            rendered.push_str(&format!("{byte:02x}"));
        }
        Self::UniqueConstraintViolation { key: rendered }
    }

    /// Creates a transaction state error.
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    /// Creates a session limit exceeded error.
    pub fn session_limit_exceeded(limit: usize) -> Self {
        Self::SessionLimitExceeded { limit }
    }
}
