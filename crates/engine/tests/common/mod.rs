#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};

use engine::{
    Account, AccountKind, AccountStatus, Client, ClientDetails, Engine, IdentifierGenerator, Money,
    NumberSource, OpenAccountCmd, PostTransactionCmd, Posting, TransactionKind,
};
use migration::MigratorTrait;
use uuid::Uuid;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    engine_with_identifiers(IdentifierGenerator::default()).await
}

pub async fn engine_with_identifiers(
    identifiers: IdentifierGenerator,
) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .identifiers(identifiers)
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Always proposes the same number.
#[derive(Debug)]
pub struct FixedSource(pub u64);

impl NumberSource for FixedSource {
    fn next_candidate(&self) -> u64 {
        self.0
    }
}

pub fn fixed_identifiers(number: u64, max_attempts: u32) -> IdentifierGenerator {
    IdentifierGenerator::new(Arc::new(FixedSource(number)), max_attempts)
}

pub fn cents(value: i64) -> Money {
    Money::new(value)
}

pub async fn new_client(engine: &Engine, last_name: &str) -> Client {
    engine
        .create_client(&ClientDetails::new(
            "Ada",
            last_name,
            format!("{}@example.com", last_name.to_lowercase()),
        ))
        .await
        .unwrap()
}

pub async fn open_account(
    engine: &Engine,
    client_id: Uuid,
    status: AccountStatus,
    opening_cents: i64,
) -> Account {
    engine
        .open_account(
            &OpenAccountCmd::new(client_id, AccountKind::Chequing)
                .opening_balance(cents(opening_cents))
                .status(status),
        )
        .await
        .unwrap()
}

/// A fresh client with one account.
pub async fn account_with(engine: &Engine, status: AccountStatus, opening_cents: i64) -> Account {
    let client = new_client(engine, "Lovelace").await;
    open_account(engine, client.id, status, opening_cents).await
}

pub async fn post(
    engine: &Engine,
    account_id: Uuid,
    kind: TransactionKind,
    amount_cents: i64,
) -> Posting {
    engine
        .post(&PostTransactionCmd::new(account_id, kind, cents(amount_cents)))
        .await
        .unwrap()
}

pub async fn balance(engine: &Engine, account_id: Uuid) -> Money {
    engine.account(account_id).await.unwrap().balance
}

pub async fn transaction_count(engine: &Engine, account_id: Uuid) -> u64 {
    engine
        .list_transactions(
            &engine::TransactionListFilter {
                account_id: Some(account_id),
                ..Default::default()
            },
            engine::Page::default(),
        )
        .await
        .unwrap()
        .total_items
}
