//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is caller-recoverable: an operation that returns one of these
/// has left the ledger exactly as it found it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A timestamp did not match `YYYY-MM-DDTHH:MM:SSZ`.
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// An input value was rejected (empty payer, non-positive spend amount, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Walking the whole ledger did not absorb the requested amount.
    #[error("insufficient points: requested {requested}, short by {shortfall}")]
    InsufficientPoints { requested: i64, shortfall: i64 },

    /// A spend would drive a payer's balance below zero (strict policy only).
    #[error("spend would leave payer {payer} with a negative balance ({balance})")]
    NegativeBalance { payer: String, balance: i64 },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn malformed_timestamp(msg: impl Into<String>) -> Self {
        Self::MalformedTimestamp(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn insufficient_points(requested: i64, shortfall: i64) -> Self {
        Self::InsufficientPoints {
            requested,
            shortfall,
        }
    }

    pub fn negative_balance(payer: impl Into<String>, balance: i64) -> Self {
        Self::NegativeBalance {
            payer: payer.into(),
            balance,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
