//! Infrastructure and service error types.
//!
//! `StoreError` is opaque to callers: it carries a message and the failing
//! operation, never domain meaning. `ServiceError` is what every service
//! operation returns.
//!
//! ## SQLSTATE mapping
//!
//! | SQLx error | Code | StoreError |
//! |------------|------|------------|
//! | Database (unique violation) | `23505` | `Database` |
//! | Database (foreign key violation) | `23503` | `Database` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | ColumnDecode / Decode / RowNotFound | N/A | `Corrupt` |

use thiserror::Error;

use brewhouse_core::DomainError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("store unavailable in {operation}: {message}")]
    Unavailable { operation: String, message: String },

    /// A stored row could not be turned back into a domain record.
    #[error("corrupt record in {operation}: {message}")]
    Corrupt { operation: String, message: String },
}

impl StoreError {
    pub fn corrupt(operation: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Map SQLx errors to `StoreError`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    let operation = operation.to_string();
    match err {
        sqlx::Error::Database(db_err) => {
            let message = match db_err.code().as_deref() {
                Some("23505") => format!("unique violation: {}", db_err.message()),
                Some("23503") => format!("foreign key violation: {}", db_err.message()),
                _ => db_err.message().to_string(),
            };
            StoreError::Database { operation, message }
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable {
            operation,
            message: "connection pool closed".to_string(),
        },
        sqlx::Error::PoolTimedOut => StoreError::Unavailable {
            operation,
            message: "timed out acquiring a connection".to_string(),
        },
        sqlx::Error::Io(e) => StoreError::Unavailable {
            operation,
            message: e.to_string(),
        },
        sqlx::Error::RowNotFound => StoreError::Corrupt {
            operation,
            message: "unexpected row not found".to_string(),
        },
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_)) => {
            StoreError::Corrupt {
                operation,
                message: e.to_string(),
            }
        }
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

/// Error returned by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Caller-recoverable condition (as opposed to an infrastructure fault).
    pub fn is_domain(&self) -> bool {
        matches!(self, ServiceError::Domain(_))
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
