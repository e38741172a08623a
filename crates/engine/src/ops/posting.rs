use chrono::Utc;
use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{
    IdentifierKind, Posting, PostTransactionCmd, ResultEngine, Transaction, posting, store,
    util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Posts a deposit, withdrawal or transfer against an account.
    ///
    /// Postings on the same account are serialized. The account row is read
    /// inside the database transaction right before the new balance is
    /// computed, and the balance update plus the new transaction row are
    /// committed together. A rejected request performs no writes; `cmd` stays
    /// with the caller untouched.
    pub async fn post(&self, cmd: &PostTransactionCmd) -> ResultEngine<Posting> {
        let _guards = self.lock_accounts(&[cmd.account_id]).await;
        let result = self.retry_on_collision(|| self.try_post(cmd)).await;

        match &result {
            Ok(posting) => tracing::info!(
                account_id = %cmd.account_id,
                kind = %cmd.kind,
                amount = %cmd.amount,
                number = %posting.transaction_number,
                new_balance = %posting.new_balance,
                "transaction posted"
            ),
            Err(err) if err.is_rejection() => tracing::info!(
                account_id = %cmd.account_id,
                kind = %cmd.kind,
                amount = %cmd.amount,
                reason = err.code(),
                "posting rejected"
            ),
            Err(err) => tracing::warn!(
                account_id = %cmd.account_id,
                error = %err,
                "posting failed"
            ),
        }
        result
    }

    async fn try_post(&self, cmd: &PostTransactionCmd) -> ResultEngine<Posting> {
        let description = normalize_optional_text(cmd.description.as_deref());
        with_tx!(self, |db_tx| {
            let mut account = store::require_account(&db_tx, cmd.account_id).await?;
            let new_balance = posting::apply(&account, cmd.kind, cmd.amount)?;

            let number = self
                .identifiers
                .generate_unique(&db_tx, IdentifierKind::Transaction)
                .await?;
            let transaction = Transaction {
                id: Uuid::new_v4(),
                number,
                occurred_at: Utc::now(),
                amount: cmd.amount,
                kind: cmd.kind,
                description,
                account_id: account.id,
                version: 0,
            };

            account.balance = new_balance;
            store::save_account_and_transaction(&db_tx, &account, &transaction).await?;

            Ok(Posting {
                message: posting::message(cmd.kind, cmd.amount, &transaction.number),
                transaction_id: transaction.id,
                transaction_number: transaction.number,
                account_id: account.id,
                new_balance,
            })
        })
    }
}
