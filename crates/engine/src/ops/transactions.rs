use sea_orm::{
    Condition, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    CascadeTarget, EngineError, Identifier, Money, Page, Paged, ResultEngine, Transaction,
    TransactionListFilter, UpdateTransactionCmd, posting, store, transactions,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    pub async fn transaction(&self, transaction_id: Uuid) -> ResultEngine<Transaction> {
        store::find_transaction(&self.database, transaction_id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(transaction_id.to_string()))
    }

    pub async fn transaction_by_number(&self, number: &Identifier) -> ResultEngine<Transaction> {
        transactions::Entity::find()
            .filter(transactions::Column::Number.eq(number.as_str()))
            .one(&self.database)
            .await?
            .map(Transaction::try_from)
            .transpose()?
            .ok_or_else(|| EngineError::TransactionNotFound(number.to_string()))
    }

    /// Lists transactions, newest first.
    pub async fn list_transactions(
        &self,
        filter: &TransactionListFilter,
        page: Page,
    ) -> ResultEngine<Paged<Transaction>> {
        let page = page.clamped();
        let mut query = transactions::Entity::find();
        if let Some(account_id) = filter.account_id {
            query = query.filter(transactions::Column::AccountId.eq(account_id.to_string()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(transactions::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(transactions::Column::OccurredAt.lte(to));
        }
        if let Some(search) = normalize_optional_text(filter.search.as_deref()) {
            query = query.filter(
                Condition::any()
                    .add(transactions::Column::Description.contains(&search))
                    .add(transactions::Column::Number.contains(&search)),
            );
        }

        let paginator = query
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Number)
            .paginate(&self.database, page.size);
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator
            .fetch_page(page.index())
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Paged {
            items,
            page,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Edits a posted transaction.
    ///
    /// When amount, kind or account change, the old effect is reversed on the
    /// old account and the new effect is validated with the posting rules and
    /// applied to the (possibly different) target account. Both balances and
    /// the transaction row commit together. Description-only edits leave
    /// balances alone. The transaction number never changes.
    pub async fn update_transaction(
        &self,
        cmd: &UpdateTransactionCmd,
    ) -> ResultEngine<Transaction> {
        let current = self.transaction(cmd.transaction_id).await?;
        let target_account_id = cmd.account_id.unwrap_or(current.account_id);
        let _guards = self
            .lock_accounts(&[current.account_id, target_account_id])
            .await;

        let updated = with_tx!(self, |db_tx| {
            let mut transaction = store::find_transaction(&db_tx, cmd.transaction_id)
                .await?
                .ok_or_else(|| {
                    EngineError::TransactionNotFound(format!(
                        "{} no longer exists",
                        cmd.transaction_id
                    ))
                })?;
            if transaction.account_id != current.account_id {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "transaction {} moved to another account",
                    transaction.number
                )));
            }

            if let Some(description) = &cmd.description {
                transaction.description = normalize_optional_text(description.as_deref());
            }

            if cmd.touches_balance() {
                let new_kind = cmd.kind.unwrap_or(transaction.kind);
                let new_amount = cmd.amount.unwrap_or(transaction.amount);
                let mut source = store::require_account(&db_tx, transaction.account_id).await?;

                if target_account_id == source.id {
                    let mut preview = source.clone();
                    preview.balance = posting::reverse_unchecked(
                        source.balance,
                        transaction.kind,
                        transaction.amount,
                    )?;
                    source.balance = posting::apply(&preview, new_kind, new_amount)?;
                    store::save_account(&db_tx, &source).await?;
                } else {
                    let mut target = store::require_account(&db_tx, target_account_id).await?;
                    source.balance =
                        posting::reverse(&source, transaction.kind, transaction.amount)?;
                    target.balance = posting::apply(&target, new_kind, new_amount)?;
                    store::save_account(&db_tx, &source).await?;
                    store::save_account(&db_tx, &target).await?;
                }

                transaction.kind = new_kind;
                transaction.amount = new_amount;
                transaction.account_id = target_account_id;
            }

            transaction.version = store::save_transaction(&db_tx, &transaction).await?;
            Ok(transaction)
        })?;

        tracing::info!(
            number = %updated.number,
            account_id = %updated.account_id,
            kind = %updated.kind,
            amount = %updated.amount,
            "transaction updated"
        );
        Ok(updated)
    }

    /// Deletes a transaction and reverses its effect on the account balance.
    ///
    /// Returns the account balance after the reversal.
    pub async fn delete_transaction(&self, transaction_id: Uuid) -> ResultEngine<Money> {
        let current = self.transaction(transaction_id).await?;
        let _guards = self.lock_accounts(&[current.account_id]).await;

        let balance = with_tx!(self, |db_tx| {
            let transaction = store::find_transaction(&db_tx, transaction_id)
                .await?
                .ok_or_else(|| {
                    EngineError::TransactionNotFound(format!("{transaction_id} no longer exists"))
                })?;
            if transaction.version != current.version {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "transaction {} changed since it was read",
                    transaction.number
                )));
            }

            let mut account = store::require_account(&db_tx, transaction.account_id).await?;
            account.balance = posting::reverse(&account, transaction.kind, transaction.amount)?;
            store::save_account(&db_tx, &account).await?;
            store::delete_cascade(&db_tx, CascadeTarget::Transaction(transaction_id)).await?;
            Ok(account.balance)
        })?;

        tracing::info!(
            number = %current.number,
            account_id = %current.account_id,
            new_balance = %balance,
            "transaction deleted"
        );
        Ok(balance)
    }
}
