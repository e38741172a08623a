//! Transaction primitives.
//!
//! A `Transaction` is the record of one posting against one account. Rows are
//! only created by the posting engine.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Identifier, Money,
    util::{parse_uuid, stored_identifier},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    /// Debits the account only; no counterparty is credited.
    Transfer,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 3] = [Self::Deposit, Self::Withdrawal, Self::Transfer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }

    /// `true` when the kind takes money out of the account.
    pub fn is_debit(self) -> bool {
        matches!(self, Self::Withdrawal | Self::Transfer)
    }

    /// Signed balance effect of `amount` for this kind.
    pub fn signed(self, amount: Money) -> Money {
        if self.is_debit() { -amount } else { amount }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub number: Identifier,
    pub occurred_at: DateTime<Utc>,
    pub amount: Money,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub account_id: Uuid,
    pub version: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub number: String,
    pub occurred_at: DateTimeUtc,
    pub amount_minor: i64,
    pub kind: String,
    pub description: Option<String>,
    pub account_id: String,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            number: ActiveValue::Set(tx.number.to_string()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            description: ActiveValue::Set(tx.description.clone()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            version: ActiveValue::Set(tx.version),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            number: stored_identifier(&model.number)?,
            occurred_at: model.occurred_at,
            amount: Money::new(model.amount_minor),
            kind: TransactionKind::try_from(model.kind.as_str())?,
            description: model.description,
            account_id: parse_uuid(&model.account_id, "account")?,
            version: model.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debits_are_negative() {
        let amount = Money::new(500);
        assert_eq!(TransactionKind::Deposit.signed(amount), Money::new(500));
        assert_eq!(TransactionKind::Withdrawal.signed(amount), Money::new(-500));
        assert_eq!(TransactionKind::Transfer.signed(amount), Money::new(-500));
    }

    #[test]
    fn kind_parses_stored_values() {
        for kind in TransactionKind::ALL {
            assert_eq!(TransactionKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionKind::try_from("refund").is_err());
    }
}
