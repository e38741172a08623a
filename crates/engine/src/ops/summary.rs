use sea_orm::{PaginatorTrait, QueryFilter, Statement, TransactionTrait, prelude::*};
use serde::Serialize;

use crate::{AccountStatus, Money, ResultEngine, accounts, clients};

use super::{Engine, with_tx};

/// Bank-wide totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total_clients: u64,
    pub total_accounts: u64,
    pub active_accounts: u64,
    /// Sum of every stored account balance, whatever the status.
    pub total_balance: Money,
}

impl Engine {
    /// Counts clients and accounts and sums all balances in one read.
    pub async fn summary(&self) -> ResultEngine<LedgerSummary> {
        with_tx!(self, |db_tx| {
            let total_clients = clients::Entity::find().count(&db_tx).await?;
            let total_accounts = accounts::Entity::find().count(&db_tx).await?;
            let active_accounts = accounts::Entity::find()
                .filter(accounts::Column::Status.eq(AccountStatus::Active.as_str()))
                .count(&db_tx)
                .await?;
            let total_balance: i64 = {
                let stmt = Statement::from_string(
                    db_tx.get_database_backend(),
                    "SELECT COALESCE(SUM(balance_minor), 0) AS sum FROM accounts;",
                );
                let row = db_tx.query_one(stmt).await?;
                row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0)
            };

            Ok(LedgerSummary {
                total_clients,
                total_accounts,
                active_accounts,
                total_balance: Money::new(total_balance),
            })
        })
    }
}
