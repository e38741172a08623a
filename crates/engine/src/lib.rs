//! Bank ledger engine.
//!
//! Keeps clients, their accounts and the transactions posted against them in
//! a relational store. Every balance change goes through the posting rules in
//! [`posting`] and is committed together with its transaction row, so the
//! stored balance always equals the opening balance plus deposits minus
//! withdrawals and transfers.

pub use accounts::{Account, AccountKind, AccountStatus};
pub use clients::Client;
pub use commands::{
    ClientDetails, OpenAccountCmd, PostTransactionCmd, UpdateAccountCmd, UpdateTransactionCmd,
};
pub use error::EngineError;
pub use identifiers::{
    Identifier, IdentifierGenerator, IdentifierKind, NumberSource, RandomSource,
};
pub use listing::{
    AccountListFilter, ClientListFilter, Page, Paged, TransactionListFilter,
};
pub use money::Money;
pub use ops::{BalanceAudit, Engine, EngineBuilder, LedgerSummary};
pub use posting::Posting;
pub use store::{CascadeTarget, DeletedRows};
pub use transactions::{Transaction, TransactionKind};

mod accounts;
mod clients;
mod commands;
mod error;
pub mod identifiers;
pub mod listing;
mod money;
mod ops;
pub mod posting;
pub mod store;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
