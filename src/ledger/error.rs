//! Ledger Error Types
//!
//! One taxonomy for every store, the transaction executor and the transfer
//! orchestrator. The gateway maps it to HTTP through [`LedgerError::http_status`].

use thiserror::Error;

/// PostgreSQL SQLSTATE codes the ledger cares about
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
}

/// Caller-side condition rejected before any storage interaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    /// `requested` is the currency named by the caller, `held` the account's
    #[error("Account {account_id} currency mismatch: {requested} should be {held}")]
    CurrencyMismatch {
        account_id: i64,
        requested: String,
        held: String,
    },
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(#[from] Precondition),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// The unit of work failed and so did the rollback; persisted state is uncertain
    #[error("Transaction error: {cause}, Rollback error: {rollback}")]
    RollbackFailed {
        cause: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn account_not_found(account_id: i64) -> Self {
        Self::not_found("account", account_id)
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            LedgerError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            LedgerError::TransactionAborted(_) | LedgerError::RollbackFailed { .. } => {
                "TRANSACTION_ABORTED"
            }
            LedgerError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::NotFound { .. } => 404,
            LedgerError::ConstraintViolation(_) => 409,
            LedgerError::PreconditionFailed(Precondition::InvalidAmount(_)) => 400,
            LedgerError::PreconditionFailed(Precondition::CurrencyMismatch { .. }) => 422,
            LedgerError::TransactionAborted(_)
            | LedgerError::RollbackFailed { .. }
            | LedgerError::Database(_) => 500,
        }
    }

    /// Whether resubmitting the same request may succeed
    ///
    /// Informational only: nothing in the ledger retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::TransactionAborted(msg) if msg.contains("deadlock") || msg.contains("serialize"))
    }

    /// Map a failed insert of an entry/transfer row
    ///
    /// The only foreign keys on those tables point at accounts, so a
    /// foreign-key violation means the referenced account does not exist.
    pub(crate) fn from_account_reference(e: sqlx::Error, account_ids: &[i64]) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.code().as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION)
        {
            let key = account_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" or ");
            return LedgerError::not_found("account", key);
        }
        e.into()
    }

    /// Map a failed COMMIT
    ///
    /// Server-reported failures keep their SQLSTATE classification; anything
    /// else (I/O, closed pool) leaves the outcome of the commit unknown.
    pub(crate) fn from_commit(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(_) => e.into(),
            other => LedgerError::TransactionAborted(format!("commit failed: {}", other)),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => LedgerError::not_found("row", "query returned no rows"),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(sqlstate::UNIQUE_VIOLATION)
                | Some(sqlstate::FOREIGN_KEY_VIOLATION)
                | Some(sqlstate::CHECK_VIOLATION) => {
                    LedgerError::ConstraintViolation(db.message().to_string())
                }
                Some(sqlstate::DEADLOCK_DETECTED) | Some(sqlstate::SERIALIZATION_FAILURE) => {
                    LedgerError::TransactionAborted(db.message().to_string())
                }
                _ => LedgerError::Database(e.to_string()),
            },
            _ => LedgerError::Database(e.to_string()),
        }
    }
}
