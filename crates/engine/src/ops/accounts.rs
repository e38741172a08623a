use chrono::Utc;
use sea_orm::{
    Condition, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Account, AccountListFilter, CascadeTarget, DeletedRows, EngineError, Identifier,
    IdentifierKind, OpenAccountCmd, Page, Paged, ResultEngine, UpdateAccountCmd, accounts,
    clients, store, util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Opens an account for an existing client.
    ///
    /// The account number is generated here and never changes afterwards. The
    /// opening balance is stored as is; no transaction row is written for it.
    pub async fn open_account(&self, cmd: &OpenAccountCmd) -> ResultEngine<Account> {
        if cmd.opening_balance.is_negative() {
            return Err(EngineError::InvalidAmount(
                "opening balance must not be negative".to_string(),
            ));
        }

        let account = self.retry_on_collision(|| self.try_open_account(cmd)).await?;
        tracing::info!(
            account_id = %account.id,
            number = %account.number,
            client_id = %account.client_id,
            "account opened"
        );
        Ok(account)
    }

    async fn try_open_account(&self, cmd: &OpenAccountCmd) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            store::require_client_exists(&db_tx, cmd.client_id).await?;
            let number = self
                .identifiers
                .generate_unique(&db_tx, IdentifierKind::Account)
                .await?;
            let account = Account {
                id: Uuid::new_v4(),
                number,
                kind: cmd.kind,
                balance: cmd.opening_balance,
                opening_balance: cmd.opening_balance,
                open_date: cmd.open_date.unwrap_or_else(|| Utc::now().date_naive()),
                status: cmd.status,
                client_id: cmd.client_id,
                version: 0,
            };
            store::insert_account(&db_tx, &account).await?;
            Ok(account)
        })
    }

    /// Edits kind, status or owner of an account.
    ///
    /// Closed accounts reject every edit, including reopening them.
    pub async fn update_account(&self, cmd: &UpdateAccountCmd) -> ResultEngine<Account> {
        let _guards = self.lock_accounts(&[cmd.account_id]).await;
        let account = with_tx!(self, |db_tx| {
            let mut account = store::require_account(&db_tx, cmd.account_id).await?;
            account.ensure_editable()?;

            if let Some(client_id) = cmd.client_id
                && client_id != account.client_id
            {
                store::require_client_exists(&db_tx, client_id).await?;
                account.client_id = client_id;
            }
            if let Some(kind) = cmd.kind {
                account.kind = kind;
            }
            if let Some(status) = cmd.status {
                account.status = status;
            }

            account.version = store::save_account(&db_tx, &account).await?;
            Ok(account)
        })?;
        tracing::info!(
            account_id = %account.id,
            status = %account.status,
            kind = %account.kind,
            "account updated"
        );
        Ok(account)
    }

    pub async fn account(&self, account_id: Uuid) -> ResultEngine<Account> {
        store::require_account(&self.database, account_id).await
    }

    pub async fn account_by_number(&self, number: &Identifier) -> ResultEngine<Account> {
        accounts::Entity::find()
            .filter(accounts::Column::Number.eq(number.as_str()))
            .one(&self.database)
            .await?
            .map(Account::try_from)
            .transpose()?
            .ok_or_else(|| EngineError::AccountNotFound(number.to_string()))
    }

    /// Lists accounts ordered by number.
    ///
    /// `search` matches the account number or the first or last name of the
    /// owning client.
    pub async fn list_accounts(
        &self,
        filter: &AccountListFilter,
        page: Page,
    ) -> ResultEngine<Paged<Account>> {
        let page = page.clamped();
        let mut query = accounts::Entity::find();
        if let Some(client_id) = filter.client_id {
            query = query.filter(accounts::Column::ClientId.eq(client_id.to_string()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(accounts::Column::Kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(accounts::Column::Status.eq(status.as_str()));
        }
        if let Some(prefix) = normalize_optional_text(filter.number_prefix.as_deref()) {
            query = query.filter(accounts::Column::Number.starts_with(&prefix));
        }
        if let Some(search) = normalize_optional_text(filter.search.as_deref()) {
            query = query
                .join(JoinType::InnerJoin, accounts::Relation::Clients.def())
                .filter(
                    Condition::any()
                        .add(accounts::Column::Number.contains(&search))
                        .add(clients::Column::FirstName.contains(&search))
                        .add(clients::Column::LastName.contains(&search)),
                );
        }

        let paginator = query
            .order_by_asc(accounts::Column::Number)
            .paginate(&self.database, page.size);
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator
            .fetch_page(page.index())
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Paged {
            items,
            page,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Every account of a client, unpaginated.
    pub async fn list_accounts_of_client(&self, client_id: Uuid) -> ResultEngine<Vec<Account>> {
        accounts::Entity::find()
            .filter(accounts::Column::ClientId.eq(client_id.to_string()))
            .order_by_asc(accounts::Column::Number)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    /// Deletes an account and all of its transactions.
    pub async fn delete_account(&self, account_id: Uuid) -> ResultEngine<DeletedRows> {
        let _guards = self.lock_accounts(&[account_id]).await;
        let deleted = with_tx!(self, |db_tx| {
            store::delete_cascade(&db_tx, CascadeTarget::Account(account_id)).await
        })?;
        tracing::info!(%account_id, transactions = deleted.transactions, "account deleted");
        Ok(deleted)
    }
}
