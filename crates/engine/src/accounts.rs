//! Accounts and their lifecycle state.
//!
//! An account's `status` is a plain attribute: it is set at creation and
//! changed through edits. The only transition rule lives here: a `Closed`
//! account cannot be edited anymore. What each status allows to be posted is
//! decided by the posting rules in [`crate::posting`].

use std::fmt;

use chrono::NaiveDate;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Identifier, Money, ResultEngine,
    util::{parse_uuid, stored_identifier},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    #[default]
    Chequing,
    Savings,
    Investment,
    Business,
}

impl AccountKind {
    pub const ALL: [AccountKind; 4] = [
        Self::Chequing,
        Self::Savings,
        Self::Investment,
        Self::Business,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chequing => "chequing",
            Self::Savings => "savings",
            Self::Investment => "investment",
            Self::Business => "business",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chequing" => Ok(Self::Chequing),
            "savings" => Ok(Self::Savings),
            "investment" => Ok(Self::Investment),
            "business" => Ok(Self::Business),
            other => Err(EngineError::InvalidInput(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// Lifecycle state of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Frozen,
    Closed,
}

impl AccountStatus {
    pub const ALL: [AccountStatus; 4] = [Self::Active, Self::Inactive, Self::Frozen, Self::Closed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Frozen => "frozen",
            Self::Closed => "closed",
        }
    }

    /// `Closed` is terminal for edits.
    pub fn is_editable(self) -> bool {
        self != Self::Closed
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AccountStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "frozen" => Ok(Self::Frozen),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid account status: {other}"
            ))),
        }
    }
}

/// A client account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Public number, assigned once at creation and never regenerated.
    pub number: Identifier,
    pub kind: AccountKind,
    pub balance: Money,
    /// Balance at creation; no transaction row exists for it.
    pub opening_balance: Money,
    pub open_date: NaiveDate,
    pub status: AccountStatus,
    pub client_id: Uuid,
    /// Optimistic-concurrency marker, bumped on every write.
    pub version: i64,
}

impl Account {
    /// Rejects edits on closed accounts.
    pub fn ensure_editable(&self) -> ResultEngine<()> {
        if !self.status.is_editable() {
            return Err(EngineError::AccountClosed(self.number.to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub number: String,
    pub kind: String,
    pub balance_minor: i64,
    pub opening_balance_minor: i64,
    pub open_date: Date,
    pub status: String,
    pub client_id: String,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(
        belongs_to = "super::clients::Entity",
        from = "Column::ClientId",
        to = "super::clients::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Clients,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::clients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(value: &Account) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            number: ActiveValue::Set(value.number.to_string()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            balance_minor: ActiveValue::Set(value.balance.cents()),
            opening_balance_minor: ActiveValue::Set(value.opening_balance.cents()),
            open_date: ActiveValue::Set(value.open_date),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            client_id: ActiveValue::Set(value.client_id.to_string()),
            version: ActiveValue::Set(value.version),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            number: stored_identifier(&model.number)?,
            kind: AccountKind::try_from(model.kind.as_str())?,
            balance: Money::new(model.balance_minor),
            opening_balance: Money::new(model.opening_balance_minor),
            open_date: model.open_date,
            status: AccountStatus::try_from(model.status.as_str())?,
            client_id: parse_uuid(&model.client_id, "client")?,
            version: model.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(status: AccountStatus) -> Account {
        Account {
            id: Uuid::new_v4(),
            number: Identifier::from_number(1_234_567_890).unwrap(),
            kind: AccountKind::Savings,
            balance: Money::new(10_000),
            opening_balance: Money::new(10_000),
            open_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            status,
            client_id: Uuid::new_v4(),
            version: 0,
        }
    }

    #[test]
    fn only_closed_accounts_are_locked_for_edits() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Inactive,
            AccountStatus::Frozen,
        ] {
            assert!(account(status).ensure_editable().is_ok());
        }
        assert_eq!(
            account(AccountStatus::Closed).ensure_editable(),
            Err(EngineError::AccountClosed("1234567890".to_string()))
        );
    }

    #[test]
    fn status_and_kind_parse_case_insensitively() {
        assert_eq!(
            AccountStatus::try_from("Frozen").unwrap(),
            AccountStatus::Frozen
        );
        assert_eq!(
            AccountKind::try_from(" CHEQUING ").unwrap(),
            AccountKind::Chequing
        );
        assert!(AccountStatus::try_from("dormant").is_err());
        assert!(AccountKind::try_from("credit").is_err());
    }

    #[test]
    fn model_round_trips_through_active_model() {
        let acc = account(AccountStatus::Inactive);
        let active: ActiveModel = (&acc).into();
        assert_eq!(active.status.unwrap(), "inactive");
        assert_eq!(active.balance_minor.unwrap(), 10_000);
    }
}
