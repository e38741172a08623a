use chrono::Utc;
use sea_orm::{
    ActiveValue, Condition, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    CascadeTarget, Client, ClientDetails, ClientListFilter, DeletedRows, EngineError, Page, Paged,
    ResultEngine, accounts, clients, store,
    util::{normalize_email, normalize_optional_text, normalize_required_text, parse_uuid},
};

use super::{Engine, with_tx};

/// Trimmed and validated client fields.
struct NormalizedDetails {
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    province: Option<String>,
    postal_code: Option<String>,
}

fn normalize_details(details: &ClientDetails) -> ResultEngine<NormalizedDetails> {
    Ok(NormalizedDetails {
        first_name: normalize_required_text(&details.first_name, "first name")?,
        last_name: normalize_required_text(&details.last_name, "last name")?,
        email: normalize_email(&details.email)?,
        phone: normalize_optional_text(details.phone.as_deref()),
        address: normalize_optional_text(details.address.as_deref()),
        city: normalize_optional_text(details.city.as_deref()),
        province: normalize_optional_text(details.province.as_deref()),
        postal_code: normalize_optional_text(details.postal_code.as_deref()),
    })
}

impl Engine {
    /// Registers a new client.
    pub async fn create_client(&self, details: &ClientDetails) -> ResultEngine<Client> {
        let details = normalize_details(details)?;
        let client = Client {
            id: Uuid::new_v4(),
            first_name: details.first_name,
            last_name: details.last_name,
            email: details.email,
            phone: details.phone,
            address: details.address,
            city: details.city,
            province: details.province,
            postal_code: details.postal_code,
            created_at: Utc::now(),
        };
        clients::ActiveModel::from(&client)
            .insert(&self.database)
            .await?;
        tracing::info!(client_id = %client.id, "client created");
        Ok(client)
    }

    /// Replaces the contact details of a client.
    pub async fn update_client(
        &self,
        client_id: Uuid,
        details: &ClientDetails,
    ) -> ResultEngine<Client> {
        let details = normalize_details(details)?;
        with_tx!(self, |db_tx| {
            let model = clients::Entity::find_by_id(client_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::ClientNotFound(client_id.to_string()))?;

            let mut active: clients::ActiveModel = model.into();
            active.first_name = ActiveValue::Set(details.first_name);
            active.last_name = ActiveValue::Set(details.last_name);
            active.email = ActiveValue::Set(details.email);
            active.phone = ActiveValue::Set(details.phone);
            active.address = ActiveValue::Set(details.address);
            active.city = ActiveValue::Set(details.city);
            active.province = ActiveValue::Set(details.province);
            active.postal_code = ActiveValue::Set(details.postal_code);
            let model = active.update(&db_tx).await?;

            Client::try_from(model)
        })
    }

    pub async fn client(&self, client_id: Uuid) -> ResultEngine<Client> {
        let model = clients::Entity::find_by_id(client_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::ClientNotFound(client_id.to_string()))?;
        Client::try_from(model)
    }

    /// Lists clients ordered by last name, first name.
    pub async fn list_clients(
        &self,
        filter: &ClientListFilter,
        page: Page,
    ) -> ResultEngine<Paged<Client>> {
        let page = page.clamped();
        let mut query = clients::Entity::find();
        if let Some(search) = normalize_optional_text(filter.search.as_deref()) {
            query = query.filter(
                Condition::any()
                    .add(clients::Column::FirstName.contains(&search))
                    .add(clients::Column::LastName.contains(&search))
                    .add(clients::Column::Email.contains(&search)),
            );
        }
        if let Some(city) = normalize_optional_text(filter.city.as_deref()) {
            query = query.filter(clients::Column::City.eq(city));
        }

        let paginator = query
            .order_by_asc(clients::Column::LastName)
            .order_by_asc(clients::Column::FirstName)
            .order_by_asc(clients::Column::Id)
            .paginate(&self.database, page.size);
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator
            .fetch_page(page.index())
            .await?
            .into_iter()
            .map(Client::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(Paged {
            items,
            page,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Deletes a client together with its accounts and their transactions.
    ///
    /// An account opened for the client after its locks were taken fails the
    /// delete with a retryable `ConcurrencyConflict`.
    pub async fn delete_client(&self, client_id: Uuid) -> ResultEngine<DeletedRows> {
        let locked = account_ids_of_client(&self.database, client_id).await?;
        let _guards = self.lock_accounts(&locked).await;
        let deleted = self.delete_client_holding(client_id, &locked).await?;
        tracing::info!(
            %client_id,
            accounts = deleted.accounts,
            transactions = deleted.transactions,
            "client deleted"
        );
        Ok(deleted)
    }

    /// Cascade delete, with the locks of `locked` already held by the caller.
    async fn delete_client_holding(
        &self,
        client_id: Uuid,
        locked: &[Uuid],
    ) -> ResultEngine<DeletedRows> {
        with_tx!(self, |db_tx| {
            let current = account_ids_of_client(&db_tx, client_id).await?;
            if let Some(unlocked) = current.iter().find(|&id| !locked.contains(id)) {
                tracing::warn!(%client_id, account_id = %unlocked, "account opened during delete");
                return Err(EngineError::ConcurrencyConflict(format!(
                    "account {unlocked} was opened for client {client_id} during the delete"
                )));
            }
            store::delete_cascade(&db_tx, CascadeTarget::Client(client_id)).await
        })
    }
}

async fn account_ids_of_client<C: ConnectionTrait>(
    db: &C,
    client_id: Uuid,
) -> ResultEngine<Vec<Uuid>> {
    accounts::Entity::find()
        .filter(accounts::Column::ClientId.eq(client_id.to_string()))
        .select_only()
        .column(accounts::Column::Id)
        .into_tuple::<String>()
        .all(db)
        .await?
        .iter()
        .map(|id| parse_uuid(id, "account"))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::{AccountKind, OpenAccountCmd, ops::tests::engine_with_db};

    use super::*;

    #[tokio::test]
    async fn delete_refuses_accounts_it_did_not_lock() {
        let engine = engine_with_db().await;
        let client = engine
            .create_client(&ClientDetails::new("Edsger", "Dijkstra", "ewd@example.com"))
            .await
            .unwrap();
        let first = engine
            .open_account(&OpenAccountCmd::new(client.id, AccountKind::Chequing))
            .await
            .unwrap();
        let late = engine
            .open_account(&OpenAccountCmd::new(client.id, AccountKind::Savings))
            .await
            .unwrap();

        let err = engine
            .delete_client_holding(client.id, &[first.id])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConcurrencyConflict(_)));
        assert!(err.is_retryable());
        assert_eq!(engine.account(late.id).await.unwrap().id, late.id);
        assert_eq!(engine.client(client.id).await.unwrap().id, client.id);

        let deleted = engine.delete_client(client.id).await.unwrap();
        assert_eq!(deleted.accounts, 2);
    }
}
