//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// These are expected, caller-recoverable conditions. Infrastructure
/// failures (connectivity, constraint violations) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced entity is absent or owned by another tenant.
    #[error("{0} not found")]
    NotFound(String),

    /// A status change not listed in the transition table.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A decrementing movement exceeds the known balance.
    #[error("insufficient stock: available {available} {unit}, requested {requested} {unit}")]
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
        unit: String,
    },

    /// The operation is not allowed in the entity's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed cross-reference in the request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A value failed validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_transition(from: impl core::fmt::Display, to: impl core::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn insufficient_stock(available: Decimal, requested: Decimal, unit: impl Into<String>) -> Self {
        Self::InsufficientStock {
            available,
            requested,
            unit: unit.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable code for the request-handling layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::Conflict(_) => "CONFLICT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}
