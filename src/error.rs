//! Commission Error Types
//!
//! One error taxonomy shared by every component. Codes are stable strings for
//! API responses; the HTTP layer itself lives outside this crate.

use thiserror::Error;

/// Postgres SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for check constraint violations
const CHECK_VIOLATION: &str = "23514";

/// Postgres SQLSTATE raised when `statement_timeout` fires
const QUERY_CANCELED: &str = "57014";

/// Postgres SQLSTATE for a value outside a NUMERIC column's precision
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Default name Postgres gives `CHECK (balance >= 0)` on `user_balances`
const BALANCE_CHECK: &str = "user_balances_balance_check";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommissionError {
    /// Distributor, withdrawal, application or level config absent
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Conflicting state: {0}")]
    ConflictingState(String),

    /// Transaction or commit failure. Nothing was committed.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Deadline exceeded. Nothing was committed.
    #[error("Operation timed out")]
    Timeout,
}

impl CommissionError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CommissionError::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        CommissionError::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CommissionError::ConflictingState(msg.into())
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            CommissionError::NotFound(_) => "NOT_FOUND",
            CommissionError::InvalidInput(_) => "INVALID_INPUT",
            CommissionError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            CommissionError::ConflictingState(_) => "CONFLICTING_STATE",
            CommissionError::Storage(_) => "STORAGE_FAILURE",
            CommissionError::Timeout => "TIMEOUT",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            CommissionError::NotFound(_) => 404,
            CommissionError::InvalidInput(_) => 400,
            CommissionError::InsufficientBalance => 422,
            CommissionError::ConflictingState(_) => 409,
            CommissionError::Storage(_) => 500,
            CommissionError::Timeout => 503,
        }
    }

    /// Whether the caller may safely retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommissionError::Storage(_) | CommissionError::Timeout)
    }
}

impl From<sqlx::Error> for CommissionError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut => CommissionError::Timeout,
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                CommissionError::Timeout
            }
            sqlx::Error::Database(db)
                if db.code().as_deref() == Some(CHECK_VIOLATION)
                    && db.constraint() == Some(BALANCE_CHECK) =>
            {
                CommissionError::InsufficientBalance
            }
            // an accumulated balance past NUMERIC(20, 8); retrying cannot help
            sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) => {
                CommissionError::invalid(format!("amount out of range: {}", db.message()))
            }
            _ => CommissionError::Storage(e.to_string()),
        }
    }
}

/// True when the error is a unique-constraint violation (optionally on a named constraint)
pub fn is_unique_violation(e: &sqlx::Error, constraint: Option<&str>) -> bool {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            match constraint {
                Some(name) => db.constraint() == Some(name),
                None => true,
            }
        }
        _ => false,
    }
}

pub type CommissionResult<T> = Result<T, CommissionError>;
