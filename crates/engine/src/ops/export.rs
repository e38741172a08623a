use std::io::Write;

use csv::Writer;
use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Transaction, store, transactions};

use super::Engine;

#[derive(Serialize)]
struct ExportRow {
    number: String,
    occurred_at: String,
    kind: &'static str,
    amount: String,
    amount_minor: i64,
    description: Option<String>,
}

impl From<Transaction> for ExportRow {
    fn from(transaction: Transaction) -> Self {
        Self {
            number: transaction.number.to_string(),
            occurred_at: transaction.occurred_at.to_rfc3339(),
            kind: transaction.kind.as_str(),
            amount: transaction.amount.to_string(),
            amount_minor: transaction.amount.cents(),
            description: transaction.description,
        }
    }
}

impl Engine {
    /// Writes every transaction of an account as CSV, oldest first. The header
    /// row is emitted with the first record, so an empty account produces an
    /// empty document. Returns the number of records written.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        account_id: Uuid,
        writer: W,
    ) -> ResultEngine<usize> {
        let account = store::require_account(&self.database, account_id).await?;
        let rows = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(transactions::Column::OccurredAt)
            .order_by_asc(transactions::Column::Number)
            .all(&self.database)
            .await?;

        let mut csv = Writer::from_writer(writer);
        let mut written = 0;
        for row in rows {
            let transaction = Transaction::try_from(row)?;
            csv.serialize(ExportRow::from(transaction)).map_err(|err| {
                tracing::error!(%account_id, "failed to serialize export row: {err}");
                EngineError::Export(err.to_string())
            })?;
            written += 1;
        }
        csv.flush()
            .map_err(|err| EngineError::Export(err.to_string()))?;

        tracing::info!(number = %account.number, rows = written, "transactions exported");
        Ok(written)
    }
}
