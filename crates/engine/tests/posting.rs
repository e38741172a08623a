use std::sync::Arc;

use engine::{AccountStatus, EngineError, Identifier, PostTransactionCmd, TransactionKind};

mod common;

use common::{account_with, balance, cents, engine_with_db, post, transaction_count};

#[tokio::test]
async fn withdrawal_above_balance_is_rejected_without_writes() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Active, 100_00).await;

    let err = engine
        .post(&PostTransactionCmd::withdrawal(account.id, cents(150_00)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(err.code(), "insufficient_funds");
    assert_eq!(err.field(), Some("amount"));
    assert_eq!(balance(&engine, account.id).await, cents(100_00));
    assert_eq!(transaction_count(&engine, account.id).await, 0);
    assert_eq!(engine.account(account.id).await.unwrap().version, 0);
}

#[tokio::test]
async fn deposit_updates_balance_and_records_a_numbered_transaction() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Active, 100_00).await;

    let posting = post(&engine, account.id, TransactionKind::Deposit, 50_00).await;

    assert_eq!(posting.new_balance, cents(150_00));
    assert_eq!(posting.account_id, account.id);
    assert_eq!(posting.transaction_number.as_str().len(), 10);
    assert!(posting.message.contains(posting.transaction_number.as_str()));
    assert_eq!(balance(&engine, account.id).await, cents(150_00));

    let stored = engine
        .transaction_by_number(&posting.transaction_number)
        .await
        .unwrap();
    assert_eq!(stored.id, posting.transaction_id);
    assert_eq!(stored.amount, cents(50_00));
    assert_eq!(stored.kind, TransactionKind::Deposit);
    assert_eq!(stored.account_id, account.id);
}

#[tokio::test]
async fn inactive_account_accepts_only_deposits() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Inactive, 0).await;

    let err = engine
        .post(&PostTransactionCmd::withdrawal(account.id, cents(1)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::RestrictedToDeposits);
    assert_eq!(err.field(), Some("kind"));

    let err = engine
        .post(&PostTransactionCmd::transfer(account.id, cents(1)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::RestrictedToDeposits);

    let posting = post(&engine, account.id, TransactionKind::Deposit, 10_00).await;
    assert_eq!(posting.new_balance, cents(10_00));
    assert_eq!(transaction_count(&engine, account.id).await, 1);
}

#[tokio::test]
async fn frozen_and_closed_accounts_reject_every_posting() {
    let (engine, _db) = engine_with_db().await;

    for status in [AccountStatus::Frozen, AccountStatus::Closed] {
        let account = account_with(&engine, status, 500_00).await;
        for kind in TransactionKind::ALL {
            for amount in [0, 1, 100_00, 1_000_000_00] {
                let err = engine
                    .post(&PostTransactionCmd::new(account.id, kind, cents(amount)))
                    .await
                    .unwrap_err();
                assert_eq!(err, EngineError::AccountNotEligible(status));
                assert!(err.is_rejection());
            }
        }
        let after = engine.account(account.id).await.unwrap();
        assert_eq!(after.balance, cents(500_00));
        assert_eq!(after.version, 0);
        assert_eq!(transaction_count(&engine, account.id).await, 0);
    }
}

#[tokio::test]
async fn non_positive_amounts_are_invalid() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Active, 10_00).await;

    for amount in [0, -5_00] {
        let err = engine
            .post(&PostTransactionCmd::deposit(account.id, cents(amount)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }
    assert_eq!(transaction_count(&engine, account.id).await, 0);
}

#[tokio::test]
async fn unknown_account_is_reported_on_the_account_field() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .post(&PostTransactionCmd::deposit(uuid::Uuid::new_v4(), cents(1_00)))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::AccountNotFound(_)));
    assert_eq!(err.field(), Some("account_id"));
}

#[tokio::test]
async fn transfer_debits_the_source_account_like_a_withdrawal() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Active, 80_00).await;

    let posting = post(&engine, account.id, TransactionKind::Transfer, 30_00).await;
    assert_eq!(posting.new_balance, cents(50_00));

    let err = engine
        .post(&PostTransactionCmd::transfer(account.id, cents(50_01)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    let posting = post(&engine, account.id, TransactionKind::Transfer, 50_00).await;
    assert_eq!(posting.new_balance, cents(0));
}

#[tokio::test]
async fn balance_matches_the_ledger_after_mixed_postings() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Active, 25_00).await;

    let requests = [
        (TransactionKind::Deposit, 100_00),
        (TransactionKind::Withdrawal, 40_00),
        (TransactionKind::Withdrawal, 500_00),
        (TransactionKind::Transfer, 10_50),
        (TransactionKind::Deposit, 0),
        (TransactionKind::Deposit, 3_25),
        (TransactionKind::Transfer, 77_75),
    ];
    for (kind, amount) in requests {
        let _ = engine
            .post(&PostTransactionCmd::new(account.id, kind, cents(amount)))
            .await;
        assert!(!balance(&engine, account.id).await.is_negative());
    }

    let audit = engine.audit_account(account.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.opening_balance, cents(25_00));
    assert_eq!(audit.deposits, cents(103_25));
    assert_eq!(audit.debits, cents(128_25));
    assert_eq!(audit.actual, cents(0));
}

#[tokio::test]
async fn transaction_numbers_are_unique() {
    let (engine, _db) = engine_with_db().await;
    let account = account_with(&engine, AccountStatus::Active, 0).await;

    let mut numbers: Vec<Identifier> = Vec::new();
    for _ in 0..25 {
        let posting = post(&engine, account.id, TransactionKind::Deposit, 1_00).await;
        numbers.push(posting.transaction_number);
    }
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 25);
}

#[tokio::test]
async fn concurrent_postings_do_not_lose_updates() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);
    let account_id = account_with(&engine, AccountStatus::Active, 0).await.id;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            engine
                .post(&PostTransactionCmd::deposit(account_id, cents(5_00)))
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let account = engine.account(account_id).await.unwrap();
    assert_eq!(account.balance, cents(100_00));
    assert_eq!(account.version, 20);
    assert_eq!(transaction_count(&engine, account.id).await, 20);
    assert!(engine.audit_account(account.id).await.unwrap().is_consistent());
}
