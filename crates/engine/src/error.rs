//! The module contains the error the engine can throw.
//!
//! Validation errors ([`InvalidAmount`], [`InvalidPeriod`], [`InvalidInput`],
//! [`OverpaymentAttempt`], [`MissingClient`]) are always raised before any
//! write. State errors ([`PreconditionFailed`], [`TargetClosed`]) report the
//! persisted state that refused the transition.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidPeriod`]: EngineError::InvalidPeriod
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`OverpaymentAttempt`]: EngineError::OverpaymentAttempt
//!  [`MissingClient`]: EngineError::MissingClient
//!  [`PreconditionFailed`]: EngineError::PreconditionFailed
//!  [`TargetClosed`]: EngineError::TargetClosed
//!
//! A storage error caused by another writer (lock contention, a unique index
//! taken by a concurrent insert) converts to [`Conflict`] instead of
//! [`Database`], so the transition is re-read and re-run.
//!
//!  [`Conflict`]: EngineError::Conflict
//!  [`Database`]: EngineError::Database
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("cannot {action} {entity} {id}: status is {actual}, expected {expected}")]
    PreconditionFailed {
        entity: &'static str,
        id: String,
        action: &'static str,
        expected: String,
        actual: String,
    },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Overpayment: {0}")]
    OverpaymentAttempt(String),
    #[error("Missing client: {0}")]
    MissingClient(String),
    #[error("Payment target closed: {0}")]
    TargetClosed(String),
    #[error("Already completed: {0}")]
    AlreadyCompleted(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Too many requests from {0}")]
    TooManyRequests(String),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Collaborator failure: {0}")]
    Collaborator(String),
    #[error(transparent)]
    Database(DbErr),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if lost_write_race(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Database(err)
        }
    }
}

fn lost_write_race(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string();
    message.contains("database is locked") || message.contains("database table is locked")
}

impl EngineError {
    pub(crate) fn precondition(
        entity: &'static str,
        id: impl ToString,
        action: &'static str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::PreconditionFailed {
            entity,
            id: id.to_string(),
            action,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns `true` for errors raised by input validation, before any
    /// persisted state was read or written.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::OverpaymentAttempt(_)
                | Self::MissingClient(_)
                | Self::InvalidPeriod(_)
                | Self::InvalidInput(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (
                Self::PreconditionFailed {
                    entity: e1,
                    id: i1,
                    action: a1,
                    expected: x1,
                    actual: y1,
                },
                Self::PreconditionFailed {
                    entity: e2,
                    id: i2,
                    action: a2,
                    expected: x2,
                    actual: y2,
                },
            ) => e1 == e2 && i1 == i2 && a1 == a2 && x1 == x2 && y1 == y2,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::OverpaymentAttempt(a), Self::OverpaymentAttempt(b)) => a == b,
            (Self::MissingClient(a), Self::MissingClient(b)) => a == b,
            (Self::TargetClosed(a), Self::TargetClosed(b)) => a == b,
            (Self::AlreadyCompleted(a), Self::AlreadyCompleted(b)) => a == b,
            (Self::InvalidPeriod(a), Self::InvalidPeriod(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::TooManyRequests(a), Self::TooManyRequests(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Collaborator(a), Self::Collaborator(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::RuntimeErr;

    use super::*;

    #[test]
    fn busy_database_is_a_conflict() {
        let busy = DbErr::Exec(RuntimeErr::Internal(
            "error returned from database: (code: 5) database is locked".to_string(),
        ));
        assert!(matches!(EngineError::from(busy), EngineError::Conflict(_)));
    }

    #[test]
    fn other_storage_errors_stay_database_errors() {
        let err = EngineError::from(DbErr::Custom("disk I/O error".to_string()));
        assert!(matches!(err, EngineError::Database(_)));
        assert!(!err.is_validation());
    }
}
