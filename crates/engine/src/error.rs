//! The module contains the errors the engine can throw.
//!
//! Posting rejections ([`AccountNotFound`], [`AccountNotEligible`],
//! [`RestrictedToDeposits`], [`InsufficientFunds`], [`InvalidAmount`]) never
//! perform writes and carry a stable [`code`] plus the request [`field`] they
//! refer to, so a form layer can annotate the right input.
//!
//! [`ConcurrencyConflict`] is retryable. [`IdentifierExhausted`] is fatal and
//! meant for operators, not end users.
//!
//!  [`AccountNotFound`]: EngineError::AccountNotFound
//!  [`AccountNotEligible`]: EngineError::AccountNotEligible
//!  [`RestrictedToDeposits`]: EngineError::RestrictedToDeposits
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`ConcurrencyConflict`]: EngineError::ConcurrencyConflict
//!  [`IdentifierExhausted`]: EngineError::IdentifierExhausted
//!  [`code`]: EngineError::code
//!  [`field`]: EngineError::field
use sea_orm::DbErr;
use thiserror::Error;

use crate::{AccountStatus, IdentifierKind};

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Account is {0} and cannot accept transactions")]
    AccountNotEligible(AccountStatus),
    #[error("Inactive accounts only accept deposits")]
    RestrictedToDeposits,
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("No free {0} number found after {1} attempts")]
    IdentifierExhausted(IdentifierKind, u32),
    #[error("{0} number {1} is already taken")]
    IdentifierCollision(IdentifierKind, String),
    #[error("Client not found: {0}")]
    ClientNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Account {0} is closed and cannot be edited")]
    AccountClosed(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Stable snake-case reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "account_not_found",
            Self::AccountNotEligible(_) => "account_not_eligible",
            Self::RestrictedToDeposits => "restricted_to_deposits",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::IdentifierExhausted(..) => "identifier_exhausted",
            Self::IdentifierCollision(..) => "identifier_collision",
            Self::ClientNotFound(_) => "client_not_found",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::AccountClosed(_) => "account_closed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Export(_) => "export_failed",
            Self::Database(_) => "database",
        }
    }

    /// The request field the error attaches to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::AccountNotFound(_) | Self::AccountNotEligible(_) | Self::AccountClosed(_) => {
                Some("account_id")
            }
            Self::RestrictedToDeposits => Some("kind"),
            Self::InsufficientFunds(_) | Self::InvalidAmount(_) => Some("amount"),
            Self::ClientNotFound(_) => Some("client_id"),
            _ => None,
        }
    }

    /// `true` for validation failures that are reported back to the user.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_)
                | Self::AccountNotEligible(_)
                | Self::RestrictedToDeposits
                | Self::InsufficientFunds(_)
                | Self::InvalidAmount(_)
                | Self::ClientNotFound(_)
                | Self::TransactionNotFound(_)
                | Self::AccountClosed(_)
                | Self::InvalidInput(_)
        )
    }

    /// `true` when repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict(_) | Self::IdentifierCollision(..)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AccountNotFound(a), Self::AccountNotFound(b)) => a == b,
            (Self::AccountNotEligible(a), Self::AccountNotEligible(b)) => a == b,
            (Self::RestrictedToDeposits, Self::RestrictedToDeposits) => true,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::ConcurrencyConflict(a), Self::ConcurrencyConflict(b)) => a == b,
            (Self::IdentifierExhausted(a, x), Self::IdentifierExhausted(b, y)) => {
                a == b && x == y
            }
            (Self::IdentifierCollision(a, x), Self::IdentifierCollision(b, y)) => {
                a == b && x == y
            }
            (Self::ClientNotFound(a), Self::ClientNotFound(b)) => a == b,
            (Self::TransactionNotFound(a), Self::TransactionNotFound(b)) => a == b,
            (Self::AccountClosed(a), Self::AccountClosed(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::Export(a), Self::Export(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_point_at_their_field() {
        assert_eq!(
            EngineError::InsufficientFunds("x".to_string()).field(),
            Some("amount")
        );
        assert_eq!(EngineError::RestrictedToDeposits.field(), Some("kind"));
        assert_eq!(
            EngineError::AccountNotEligible(AccountStatus::Frozen).field(),
            Some("account_id")
        );
        assert_eq!(
            EngineError::IdentifierExhausted(IdentifierKind::Account, 3).field(),
            None
        );
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(EngineError::ConcurrencyConflict("account".to_string()).is_retryable());
        assert!(!EngineError::ConcurrencyConflict("account".to_string()).is_rejection());
        assert!(!EngineError::InsufficientFunds("x".to_string()).is_retryable());
        assert!(!EngineError::IdentifierExhausted(IdentifierKind::Transaction, 1).is_retryable());
    }

    #[test]
    fn not_eligible_message_names_status() {
        let err = EngineError::AccountNotEligible(AccountStatus::Closed);
        assert_eq!(err.to_string(), "Account is closed and cannot accept transactions");
        assert_eq!(err.code(), "account_not_eligible");
    }
}
