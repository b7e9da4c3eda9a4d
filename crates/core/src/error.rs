//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// These are deterministic business failures. Only `InsufficientStock` and
/// `Conflict` are worth retrying after the caller refreshes its view; the rest
/// need the input or the actor to change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (non-positive quantity, missing field, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An entry, request, component, location or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A decrement would drive a ledger quantity negative.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// The actor lacks the capability or relationship the operation needs.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A request is not in a status the attempted transition can start from.
    #[error("cannot {action} a request in status {from}")]
    InvalidStateTransition { from: String, action: String },

    /// Lost a compare-and-swap race or hit a uniqueness constraint.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn invalid_transition(from: impl core::fmt::Display, action: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether a caller may retry after refreshing state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientStock { .. } | Self::Conflict(_))
    }
}

/// Reject zero and negative quantities.
pub fn ensure_positive(quantity: i64, what: &str) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "{what} must be at least 1 (got {quantity})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stock_and_conflict_are_retryable() {
        assert!(DomainError::insufficient_stock(5, 1).is_retryable());
        assert!(DomainError::conflict("lost race").is_retryable());
        assert!(!DomainError::validation("bad").is_retryable());
        assert!(!DomainError::not_found("request").is_retryable());
        assert!(!DomainError::unauthorized("nope").is_retryable());
        assert!(!DomainError::invalid_transition("completed", "approve").is_retryable());
    }

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(ensure_positive(1, "quantity").is_ok());
        assert!(matches!(ensure_positive(0, "quantity"), Err(DomainError::Validation(_))));
        assert!(matches!(ensure_positive(-3, "quantity"), Err(DomainError::Validation(_))));
    }
}
