//! The module contains the errors the engine can throw.
//!
//! Caller errors (never retried):
//!
//! - [`InvalidAmount`] the amount is not strictly positive or overflows.
//! - [`InsufficientBalance`] the amount exceeds the account cash balance.
//! - [`FundNotAssociated`] the fund is not the one associated with the account.
//! - [`AccountNotFound`], [`FundNotFound`], [`TransferNotFound`] missing records.
//!
//! Infrastructure errors:
//!
//! - [`ConcurrencyConflict`] optimistic-lock collisions left after the internal retries.
//! - [`StorageUnavailable`] the record store failed; writes were rolled back first.
//! - [`CorruptedRecord`] a stored row could not be decoded. Never retried.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InsufficientBalance`]: EngineError::InsufficientBalance
//!  [`FundNotAssociated`]: EngineError::FundNotAssociated
//!  [`AccountNotFound`]: EngineError::AccountNotFound
//!  [`FundNotFound`]: EngineError::FundNotFound
//!  [`TransferNotFound`]: EngineError::TransferNotFound
//!  [`ConcurrencyConflict`]: EngineError::ConcurrencyConflict
//!  [`StorageUnavailable`]: EngineError::StorageUnavailable
//!  [`CorruptedRecord`]: EngineError::CorruptedRecord
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Fund not associated: {0}")]
    FundNotAssociated(String),
    #[error("Fund already associated: {0}")]
    FundAlreadyAssociated(String),
    #[error("\"{0}\" account not found!")]
    AccountNotFound(String),
    #[error("\"{0}\" fund not found!")]
    FundNotFound(String),
    #[error("\"{0}\" transfer not found!")]
    TransferNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Corrupted record: {0}")]
    CorruptedRecord(String),
}

impl EngineError {
    /// Stable, machine readable code for the gateway.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            Self::FundNotAssociated(_) => "FUND_NOT_ASSOCIATED",
            Self::FundAlreadyAssociated(_) => "FUND_ALREADY_ASSOCIATED",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::FundNotFound(_) => "FUND_NOT_FOUND",
            Self::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            Self::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::CorruptedRecord(_) => "CORRUPTED_RECORD",
        }
    }
}

/// Errors reported by a [`RecordStore`](crate::RecordStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    /// The expected revision did not match the stored one.
    #[error("revision conflict: {0}")]
    Conflict(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
    /// The write would leave a record outside its valid range.
    #[error("invalid write: {0}")]
    Invalid(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A stored row does not decode into its domain type.
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Transient failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<DbErr> for StoreError {
    fn from(value: DbErr) -> Self {
        match value {
            DbErr::RecordNotFound(what) => Self::NotFound(what),
            DbErr::RecordNotUpdated => Self::Conflict("record not updated".to_string()),
            other => {
                if let Some(SqlErr::UniqueConstraintViolation(message)) = other.sql_err() {
                    return Self::Duplicate(message);
                }
                let message = other.to_string();
                if message.contains("UNIQUE constraint failed") {
                    Self::Duplicate(message)
                } else {
                    Self::Unavailable(message)
                }
            }
        }
    }
}

impl From<StoreError> for EngineError {
    /// Generic mapping for paths that don't know which record was missing.
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => Self::InvalidInput(format!("{what} not exists")),
            StoreError::Conflict(what) => Self::ConcurrencyConflict(what),
            StoreError::Duplicate(what) => Self::InvalidInput(what),
            StoreError::Invalid(what) => Self::InvalidAmount(what),
            StoreError::Unavailable(what) => Self::StorageUnavailable(what),
            StoreError::Corrupted(what) => Self::CorruptedRecord(what),
        }
    }
}
