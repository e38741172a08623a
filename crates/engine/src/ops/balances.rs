use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Account, EngineError, Money, ResultEngine, Transaction, accounts, store, transactions,
};

use super::{Engine, with_tx};

/// Result of replaying an account's transactions against its stored balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceAudit {
    pub account_id: Uuid,
    pub opening_balance: Money,
    pub deposits: Money,
    pub debits: Money,
    pub expected: Money,
    pub actual: Money,
}

impl BalanceAudit {
    /// `true` when `opening + deposits - debits` equals the stored balance.
    pub fn is_consistent(&self) -> bool {
        self.expected == self.actual
    }
}

async fn replay<C: ConnectionTrait>(db: &C, account: &Account) -> ResultEngine<BalanceAudit> {
    let rows = transactions::Entity::find()
        .filter(transactions::Column::AccountId.eq(account.id.to_string()))
        .order_by_asc(transactions::Column::OccurredAt)
        .all(db)
        .await?;

    let mut deposits = Money::ZERO;
    let mut debits = Money::ZERO;
    for row in rows {
        let transaction = Transaction::try_from(row)?;
        let total = if transaction.kind.is_debit() {
            &mut debits
        } else {
            &mut deposits
        };
        *total = total.checked_add(transaction.amount).ok_or_else(|| {
            EngineError::InvalidAmount(format!("totals of account {} overflow", account.number))
        })?;
    }

    let expected = account
        .opening_balance
        .checked_add(deposits)
        .and_then(|sum| sum.checked_sub(debits))
        .ok_or_else(|| {
            EngineError::InvalidAmount(format!("totals of account {} overflow", account.number))
        })?;

    Ok(BalanceAudit {
        account_id: account.id,
        opening_balance: account.opening_balance,
        deposits,
        debits,
        expected,
        actual: account.balance,
    })
}

impl Engine {
    /// Replays the transactions of one account and compares the result with
    /// the stored balance. Nothing is written.
    pub async fn audit_account(&self, account_id: Uuid) -> ResultEngine<BalanceAudit> {
        let _guards = self.lock_accounts(&[account_id]).await;
        let audit = with_tx!(self, |db_tx| {
            let account = store::require_account(&db_tx, account_id).await?;
            replay(&db_tx, &account).await
        })?;
        if !audit.is_consistent() {
            tracing::error!(
                %account_id,
                expected = %audit.expected,
                actual = %audit.actual,
                "stored balance does not match the ledger"
            );
        }
        Ok(audit)
    }

    /// Audits every account and returns only the inconsistent ones.
    pub async fn audit_all_accounts(&self) -> ResultEngine<Vec<BalanceAudit>> {
        let ids: Vec<Uuid> = accounts::Entity::find()
            .order_by_asc(accounts::Column::Number)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .map(|account| account.map(|account| account.id))
            .collect::<ResultEngine<_>>()?;

        let mut mismatched = Vec::new();
        for account_id in ids {
            match self.audit_account(account_id).await {
                Ok(audit) if !audit.is_consistent() => mismatched.push(audit),
                Ok(_) => {}
                // Deleted between listing and auditing.
                Err(EngineError::AccountNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        tracing::info!(mismatched = mismatched.len(), "balance audit finished");
        Ok(mismatched)
    }
}
