//! Ledger store primitives.
//!
//! Thin, version-checked reads and writes over the `clients`, `accounts` and
//! `transactions` tables. Every write that takes a [`DatabaseTransaction`]
//! becomes visible only when the caller commits it; dropping the transaction
//! rolls all of them back together.
//!
//! Account and transaction rows carry a `version` column. Writes filter on the
//! version that was read and bump it; when no row matches, the row is looked up
//! again to tell a concurrent modification (`ConcurrencyConflict`) from a
//! concurrent delete (`*NotFound`, "no longer exists").

use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbErr, QueryFilter, QuerySelect, SqlErr, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Account, EngineError, Identifier, IdentifierKind, ResultEngine, Transaction, accounts,
    clients, transactions,
};

/// Entity removed by [`delete_cascade`] together with everything it owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeTarget {
    Client(Uuid),
    Account(Uuid),
    Transaction(Uuid),
}

/// Rows removed by a cascading delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeletedRows {
    pub clients: u64,
    pub accounts: u64,
    pub transactions: u64,
}

pub async fn find_account<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
) -> ResultEngine<Option<Account>> {
    accounts::Entity::find_by_id(account_id.to_string())
        .one(db)
        .await?
        .map(Account::try_from)
        .transpose()
}

pub async fn require_account<C: ConnectionTrait>(
    db: &C,
    account_id: Uuid,
) -> ResultEngine<Account> {
    find_account(db, account_id)
        .await?
        .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))
}

pub async fn find_transaction<C: ConnectionTrait>(
    db: &C,
    transaction_id: Uuid,
) -> ResultEngine<Option<Transaction>> {
    transactions::Entity::find_by_id(transaction_id.to_string())
        .one(db)
        .await?
        .map(Transaction::try_from)
        .transpose()
}

pub async fn require_client_exists<C: ConnectionTrait>(
    db: &C,
    client_id: Uuid,
) -> ResultEngine<()> {
    let exists = clients::Entity::find_by_id(client_id.to_string())
        .select_only()
        .column(clients::Column::Id)
        .into_tuple::<String>()
        .one(db)
        .await?
        .is_some();
    if !exists {
        return Err(EngineError::ClientNotFound(client_id.to_string()));
    }
    Ok(())
}

/// `true` when `value` is already used as a number of `kind`.
pub async fn exists_identifier<C: ConnectionTrait>(
    db: &C,
    kind: IdentifierKind,
    value: &str,
) -> ResultEngine<bool> {
    let found = match kind {
        IdentifierKind::Account => accounts::Entity::find()
            .filter(accounts::Column::Number.eq(value))
            .select_only()
            .column(accounts::Column::Id)
            .into_tuple::<String>()
            .one(db)
            .await?
            .is_some(),
        IdentifierKind::Transaction => transactions::Entity::find()
            .filter(transactions::Column::Number.eq(value))
            .select_only()
            .column(transactions::Column::Id)
            .into_tuple::<String>()
            .one(db)
            .await?
            .is_some(),
    };
    Ok(found)
}

/// Inserts a new account row.
pub async fn insert_account<C: ConnectionTrait>(db: &C, account: &Account) -> ResultEngine<()> {
    accounts::ActiveModel::from(account)
        .insert(db)
        .await
        .map_err(|err| insert_error(err, IdentifierKind::Account, &account.number))?;
    Ok(())
}

/// Writes the mutable fields of `account` (kind, status, owner, balance) if
/// the stored version still equals `account.version`, and returns the new
/// version.
pub async fn save_account<C: ConnectionTrait>(db: &C, account: &Account) -> ResultEngine<i64> {
    let result = accounts::Entity::update_many()
        .col_expr(accounts::Column::Kind, Expr::value(account.kind.as_str()))
        .col_expr(accounts::Column::Status, Expr::value(account.status.as_str()))
        .col_expr(
            accounts::Column::ClientId,
            Expr::value(account.client_id.to_string()),
        )
        .col_expr(
            accounts::Column::BalanceMinor,
            Expr::value(account.balance.cents()),
        )
        .col_expr(
            accounts::Column::Version,
            Expr::col(accounts::Column::Version).add(1),
        )
        .filter(accounts::Column::Id.eq(account.id.to_string()))
        .filter(accounts::Column::Version.eq(account.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(account_conflict(db, account.id).await);
    }
    Ok(account.version + 1)
}

/// Commits a posting: the account's new balance and the transaction row go
/// into the same database transaction, or neither does.
pub async fn save_account_and_transaction(
    db: &DatabaseTransaction,
    account: &Account,
    transaction: &Transaction,
) -> ResultEngine<()> {
    save_account(db, account).await?;
    transactions::ActiveModel::from(transaction)
        .insert(db)
        .await
        .map_err(|err| insert_error(err, IdentifierKind::Transaction, &transaction.number))?;
    Ok(())
}

/// Version-checked rewrite of a transaction row. The number is immutable.
pub async fn save_transaction<C: ConnectionTrait>(
    db: &C,
    transaction: &Transaction,
) -> ResultEngine<i64> {
    let result = transactions::Entity::update_many()
        .col_expr(
            transactions::Column::AmountMinor,
            Expr::value(transaction.amount.cents()),
        )
        .col_expr(
            transactions::Column::Kind,
            Expr::value(transaction.kind.as_str()),
        )
        .col_expr(
            transactions::Column::Description,
            Expr::value(transaction.description.clone()),
        )
        .col_expr(
            transactions::Column::AccountId,
            Expr::value(transaction.account_id.to_string()),
        )
        .col_expr(
            transactions::Column::Version,
            Expr::col(transactions::Column::Version).add(1),
        )
        .filter(transactions::Column::Id.eq(transaction.id.to_string()))
        .filter(transactions::Column::Version.eq(transaction.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(transaction_conflict(db, transaction.id).await);
    }
    Ok(transaction.version + 1)
}

/// Deletes `target` and everything it owns.
///
/// Children are removed explicitly so the cascade does not depend on the
/// backend enforcing foreign keys.
pub async fn delete_cascade(
    db: &DatabaseTransaction,
    target: CascadeTarget,
) -> ResultEngine<DeletedRows> {
    let mut deleted = DeletedRows::default();
    match target {
        CascadeTarget::Client(client_id) => {
            let account_ids: Vec<String> = accounts::Entity::find()
                .filter(accounts::Column::ClientId.eq(client_id.to_string()))
                .select_only()
                .column(accounts::Column::Id)
                .into_tuple()
                .all(db)
                .await?;
            if !account_ids.is_empty() {
                deleted.transactions = transactions::Entity::delete_many()
                    .filter(transactions::Column::AccountId.is_in(account_ids.clone()))
                    .exec(db)
                    .await?
                    .rows_affected;
                deleted.accounts = accounts::Entity::delete_many()
                    .filter(accounts::Column::Id.is_in(account_ids))
                    .exec(db)
                    .await?
                    .rows_affected;
            }
            deleted.clients = clients::Entity::delete_by_id(client_id.to_string())
                .exec(db)
                .await?
                .rows_affected;
            if deleted.clients == 0 {
                return Err(EngineError::ClientNotFound(client_id.to_string()));
            }
        }
        CascadeTarget::Account(account_id) => {
            deleted.transactions = transactions::Entity::delete_many()
                .filter(transactions::Column::AccountId.eq(account_id.to_string()))
                .exec(db)
                .await?
                .rows_affected;
            deleted.accounts = accounts::Entity::delete_by_id(account_id.to_string())
                .exec(db)
                .await?
                .rows_affected;
            if deleted.accounts == 0 {
                return Err(EngineError::AccountNotFound(account_id.to_string()));
            }
        }
        CascadeTarget::Transaction(transaction_id) => {
            deleted.transactions = transactions::Entity::delete_by_id(transaction_id.to_string())
                .exec(db)
                .await?
                .rows_affected;
            if deleted.transactions == 0 {
                return Err(EngineError::TransactionNotFound(transaction_id.to_string()));
            }
        }
    }
    Ok(deleted)
}

fn insert_error(err: DbErr, kind: IdentifierKind, number: &Identifier) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            EngineError::IdentifierCollision(kind, number.to_string())
        }
        _ => err.into(),
    }
}

async fn account_conflict<C: ConnectionTrait>(db: &C, account_id: Uuid) -> EngineError {
    match find_account(db, account_id).await {
        Ok(Some(_)) => {
            tracing::warn!(%account_id, "account was modified by another writer");
            EngineError::ConcurrencyConflict(format!(
                "account {account_id} changed since it was read"
            ))
        }
        Ok(None) => EngineError::AccountNotFound(format!("{account_id} no longer exists")),
        Err(err) => err,
    }
}

async fn transaction_conflict<C: ConnectionTrait>(db: &C, transaction_id: Uuid) -> EngineError {
    match find_transaction(db, transaction_id).await {
        Ok(Some(_)) => {
            tracing::warn!(%transaction_id, "transaction was modified by another writer");
            EngineError::ConcurrencyConflict(format!(
                "transaction {transaction_id} changed since it was read"
            ))
        }
        Ok(None) => EngineError::TransactionNotFound(format!("{transaction_id} no longer exists")),
        Err(err) => err,
    }
}
