//! Posting rules.
//!
//! Pure balance arithmetic shared by every write that touches an account
//! balance: new postings, transaction edits and transaction deletes. The
//! checks run in a fixed order so callers always see the same reason for the
//! same request:
//!
//! 1. the account accepts postings at all (`Frozen`/`Closed` do not);
//! 2. `Inactive` accounts only take deposits;
//! 3. debits cannot exceed the current balance;
//! 4. the amount is strictly positive.
//!
//! Account existence is checked by the caller before these rules run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Account, AccountStatus, EngineError, Identifier, Money, ResultEngine, TransactionKind,
};

/// Outcome of a successful posting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub transaction_id: Uuid,
    pub transaction_number: Identifier,
    pub account_id: Uuid,
    pub new_balance: Money,
    /// Advisory text for display.
    pub message: String,
}

/// Validates `kind`/`amount` against `account` and returns the new balance.
pub fn apply(account: &Account, kind: TransactionKind, amount: Money) -> ResultEngine<Money> {
    match account.status {
        AccountStatus::Frozen | AccountStatus::Closed => {
            return Err(EngineError::AccountNotEligible(account.status));
        }
        AccountStatus::Inactive if kind != TransactionKind::Deposit => {
            return Err(EngineError::RestrictedToDeposits);
        }
        AccountStatus::Active | AccountStatus::Inactive => {}
    }

    if kind.is_debit() && amount > account.balance {
        return Err(EngineError::InsufficientFunds(format!(
            "balance {} is lower than {amount}",
            account.balance
        )));
    }

    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(
            "amount must be greater than 0".to_string(),
        ));
    }

    let new_balance = account
        .balance
        .checked_add(kind.signed(amount))
        .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;

    // Reachable only when applying on top of a reversal preview.
    if new_balance.is_negative() {
        return Err(EngineError::InsufficientFunds(format!(
            "balance would drop to {new_balance}"
        )));
    }

    Ok(new_balance)
}

/// Removes the effect of a posted transaction from `account` and returns the
/// resulting balance.
///
/// `Frozen` and `Closed` balances cannot move, so reversal is refused there.
/// `Inactive` accounts may be reversed in either direction. Undoing a deposit
/// that was already spent is refused.
pub fn reverse(account: &Account, kind: TransactionKind, amount: Money) -> ResultEngine<Money> {
    if matches!(
        account.status,
        AccountStatus::Frozen | AccountStatus::Closed
    ) {
        return Err(EngineError::AccountNotEligible(account.status));
    }
    let reversed = reverse_unchecked(account.balance, kind, amount)?;
    if reversed.is_negative() {
        return Err(EngineError::InsufficientFunds(format!(
            "undoing this {kind} would drop the balance to {reversed}"
        )));
    }
    Ok(reversed)
}

/// Removes the effect without the non-negative check, for previews that are
/// immediately re-validated by [`apply`].
pub(crate) fn reverse_unchecked(
    balance: Money,
    kind: TransactionKind,
    amount: Money,
) -> ResultEngine<Money> {
    balance
        .checked_sub(kind.signed(amount))
        .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))
}

pub(crate) fn message(kind: TransactionKind, amount: Money, number: &Identifier) -> String {
    match kind {
        TransactionKind::Deposit => format!("Deposited {amount}, transaction {number}"),
        TransactionKind::Withdrawal => format!("Withdrew {amount}, transaction {number}"),
        TransactionKind::Transfer => format!("Transferred {amount}, transaction {number}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::AccountKind;

    fn account(status: AccountStatus, balance: i64) -> Account {
        Account {
            id: Uuid::new_v4(),
            number: Identifier::from_number(1_000_000_001).unwrap(),
            kind: AccountKind::Chequing,
            balance: Money::new(balance),
            opening_balance: Money::ZERO,
            open_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            status,
            client_id: Uuid::new_v4(),
            version: 0,
        }
    }

    #[test]
    fn deposit_adds_and_debits_subtract() {
        let acc = account(AccountStatus::Active, 100_00);
        assert_eq!(
            apply(&acc, TransactionKind::Deposit, Money::new(50_00)).unwrap(),
            Money::new(150_00)
        );
        assert_eq!(
            apply(&acc, TransactionKind::Withdrawal, Money::new(100_00)).unwrap(),
            Money::ZERO
        );
        assert_eq!(
            apply(&acc, TransactionKind::Transfer, Money::new(25_00)).unwrap(),
            Money::new(75_00)
        );
    }

    #[test]
    fn overdraft_is_rejected() {
        let acc = account(AccountStatus::Active, 100_00);
        let err = apply(&acc, TransactionKind::Withdrawal, Money::new(150_00)).unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
        let err = apply(&acc, TransactionKind::Transfer, Money::new(100_01)).unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
    }

    #[test]
    fn frozen_and_closed_reject_everything() {
        for status in [AccountStatus::Frozen, AccountStatus::Closed] {
            let acc = account(status, 1_000_00);
            for kind in TransactionKind::ALL {
                for amount in [-1, 0, 1, 5_000_00] {
                    assert_eq!(
                        apply(&acc, kind, Money::new(amount)),
                        Err(EngineError::AccountNotEligible(status))
                    );
                }
            }
        }
    }

    #[test]
    fn inactive_only_takes_deposits() {
        let acc = account(AccountStatus::Inactive, 0);
        assert_eq!(
            apply(&acc, TransactionKind::Withdrawal, Money::new(1)),
            Err(EngineError::RestrictedToDeposits)
        );
        assert_eq!(
            apply(&acc, TransactionKind::Transfer, Money::new(1)),
            Err(EngineError::RestrictedToDeposits)
        );
        assert_eq!(
            apply(&acc, TransactionKind::Deposit, Money::new(10_00)).unwrap(),
            Money::new(10_00)
        );
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let acc = account(AccountStatus::Active, 100_00);
        for amount in [0, -5_00] {
            let err = apply(&acc, TransactionKind::Deposit, Money::new(amount)).unwrap_err();
            assert_eq!(err.code(), "invalid_amount");
            let err = apply(&acc, TransactionKind::Withdrawal, Money::new(amount)).unwrap_err();
            assert_eq!(err.code(), "invalid_amount");
        }
    }

    #[test]
    fn reverse_refuses_to_overdraw() {
        let acc = account(AccountStatus::Active, 80_00);
        assert_eq!(
            reverse(&acc, TransactionKind::Withdrawal, Money::new(20_00)).unwrap(),
            Money::new(100_00)
        );
        let acc = account(AccountStatus::Inactive, 30_00);
        assert_eq!(
            reverse(&acc, TransactionKind::Deposit, Money::new(20_00)).unwrap(),
            Money::new(10_00)
        );
        let acc = account(AccountStatus::Active, 10_00);
        let err = reverse(&acc, TransactionKind::Deposit, Money::new(20_00)).unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
    }

    #[test]
    fn reverse_leaves_frozen_balances_alone() {
        let acc = account(AccountStatus::Frozen, 80_00);
        assert_eq!(
            reverse(&acc, TransactionKind::Withdrawal, Money::new(20_00)),
            Err(EngineError::AccountNotEligible(AccountStatus::Frozen))
        );
    }

    #[test]
    fn apply_after_unchecked_reversal_only_checks_the_final_balance() {
        // A 100.00 deposit of which 80.00 was spent, edited down to 90.00.
        let preview =
            reverse_unchecked(Money::new(20_00), TransactionKind::Deposit, Money::new(100_00))
                .unwrap();
        let mut acc = account(AccountStatus::Active, 0);
        acc.balance = preview;
        assert_eq!(
            apply(&acc, TransactionKind::Deposit, Money::new(90_00)).unwrap(),
            Money::new(10_00)
        );
        let err = apply(&acc, TransactionKind::Deposit, Money::new(50_00)).unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
    }
}
