use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{EngineError, IdentifierGenerator, ResultEngine};

mod accounts;
mod balances;
mod clients;
mod export;
mod posting;
mod summary;
mod transactions;

pub use balances::BalanceAudit;
pub use summary::LedgerSummary;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Per-account mutexes that serialize balance writers inside this process.
#[derive(Debug, Default)]
struct AccountLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    /// Locks every account in `ids`, always in ascending order so two writers
    /// touching the same pair cannot deadlock.
    async fn acquire(&self, ids: &[Uuid]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            ids.iter()
                .map(|id| Arc::clone(map.entry(*id).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    identifiers: IdentifierGenerator,
    locks: AccountLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    async fn lock_accounts(&self, ids: &[Uuid]) -> Vec<OwnedMutexGuard<()>> {
        self.locks.acquire(ids).await
    }

    /// Re-runs `op` while it fails on a number that a concurrent writer took
    /// between probe and insert.
    async fn retry_on_collision<T, F, Fut>(&self, mut op: F) -> ResultEngine<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResultEngine<T>>,
    {
        let attempts = self.identifiers.max_attempts();
        let mut last_kind = None;
        for attempt in 1..=attempts {
            match op().await {
                Err(EngineError::IdentifierCollision(kind, number)) => {
                    tracing::warn!(%kind, %number, attempt, "number taken at insert, retrying");
                    last_kind = Some(kind);
                }
                other => return other,
            }
        }
        let kind = last_kind.unwrap_or(crate::IdentifierKind::Transaction);
        Err(EngineError::IdentifierExhausted(kind, attempts))
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    identifiers: IdentifierGenerator,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the account/transaction number generator.
    pub fn identifiers(mut self, identifiers: IdentifierGenerator) -> EngineBuilder {
        self.identifiers = identifiers;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            identifiers: self.identifiers,
            locks: AccountLocks::default(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use chrono::Utc;
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;
    use crate::{
        Account, AccountKind, AccountStatus, ClientDetails, Identifier, IdentifierKind, Money,
        RandomSource, store,
    };

    pub(crate) async fn engine_with_db() -> Engine {
        engine_with_identifiers(IdentifierGenerator::default()).await
    }

    async fn engine_with_identifiers(identifiers: IdentifierGenerator) -> Engine {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Engine::builder()
            .database(db)
            .identifiers(identifiers)
            .build()
            .await
            .unwrap()
    }

    fn blank_account(client_id: Uuid, number: Identifier) -> Account {
        Account {
            id: Uuid::new_v4(),
            number,
            kind: AccountKind::Chequing,
            balance: Money::ZERO,
            opening_balance: Money::ZERO,
            open_date: Utc::now().date_naive(),
            status: AccountStatus::Active,
            client_id,
            version: 0,
        }
    }

    #[tokio::test]
    async fn a_number_taken_at_insert_reruns_the_operation() {
        let engine = engine_with_db().await;
        let client = engine
            .create_client(&ClientDetails::new("Barbara", "Liskov", "liskov@example.com"))
            .await
            .unwrap();
        let taken = Identifier::from_number(5_555_555_555).unwrap();
        store::insert_account(engine.database(), &blank_account(client.id, taken.clone()))
            .await
            .unwrap();

        let calls = AtomicU32::new(0);
        let account = engine
            .retry_on_collision(|| {
                let number = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    taken.clone()
                } else {
                    Identifier::from_number(6_666_666_666).unwrap()
                };
                let account = blank_account(client.id, number);
                let engine = &engine;
                async move {
                    store::insert_account(engine.database(), &account).await?;
                    Ok(account)
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(account.number.as_str(), "6666666666");
        assert_eq!(engine.account(account.id).await.unwrap().number, account.number);
    }

    #[tokio::test]
    async fn collisions_on_every_attempt_exhaust_the_budget() {
        let identifiers = IdentifierGenerator::new(Arc::new(RandomSource), 3);
        let engine = engine_with_identifiers(identifiers).await;
        let client = engine
            .create_client(&ClientDetails::new("Niklaus", "Wirth", "wirth@example.com"))
            .await
            .unwrap();
        let taken = Identifier::from_number(7_777_777_777).unwrap();
        store::insert_account(engine.database(), &blank_account(client.id, taken.clone()))
            .await
            .unwrap();

        let calls = AtomicU32::new(0);
        let err = engine
            .retry_on_collision(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                let account = blank_account(client.id, taken.clone());
                let engine = &engine;
                async move {
                    store::insert_account(engine.database(), &account).await?;
                    Ok(account)
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::IdentifierExhausted(IdentifierKind::Account, 3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn locks_serialize_the_same_account() {
        let locks = Arc::new(AccountLocks::default());
        let id = Uuid::new_v4();

        let first = locks.acquire(&[id]).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire(&[id]).await.len() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        assert_eq!(contender.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_take_one_lock() {
        let locks = AccountLocks::default();
        let id = Uuid::new_v4();
        let guards = locks.acquire(&[id, id]).await;
        assert_eq!(guards.len(), 1);
    }
}
