use crate::types::{EntityId, Money};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Allocation for budget {budget_id} exceeds 100%: {total}%")]
    OverAllocation { budget_id: EntityId, total: Decimal },

    #[error(
        "Insufficient funds on allocation {allocation_id}: allocated {allocated}, required {required}"
    )]
    InsufficientFunds {
        allocation_id: EntityId,
        allocated: Money,
        required: Money,
    },

    #[error("Conflict: '{operation}' did not commit after {attempts} attempts")]
    Conflict { operation: String, attempts: u32 },

    /// Optimistic version check failed. Retried inside `write_tx`; callers
    /// only ever see it surfaced as `Conflict`.
    #[error("Stale {entity} {id}: row changed since it was read")]
    StaleVersion { entity: &'static str, id: EntityId },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    OverAllocation,
    InsufficientFunds,
    Conflict,
    Internal,
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::OverAllocation { .. } => ErrorKind::OverAllocation,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Conflict { .. } | Self::StaleVersion { .. } => ErrorKind::Conflict,
            Self::Database(_) | Self::Serialization(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to an external caller. Internal errors are
    /// reduced to a fixed string; the detail goes to the log instead.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Busy/locked SQLite and stale optimistic versions are worth another attempt.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::StaleVersion { .. } => true,
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_allocation_message_names_the_total() {
        let err = LedgerError::OverAllocation {
            budget_id: 1,
            total: Decimal::from(110),
        };
        assert!(err.to_string().contains("exceeds 100%: 110%"));
        assert_eq!(err.kind(), ErrorKind::OverAllocation);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = LedgerError::Other(anyhow::anyhow!("disk path /var/lib/secret"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal error");
    }

    #[test]
    fn busy_database_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(LedgerError::Database(busy).is_retryable());
        assert!(!LedgerError::validation("x").is_retryable());
    }
}
