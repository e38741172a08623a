//! Command structs for engine operations.
//!
//! These types group parameters for write operations (client/account
//! lifecycle, postings and transaction edits), keeping call sites readable and
//! avoiding long argument lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccountKind, AccountStatus, Money, TransactionKind};

/// Contact details of a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
}

impl ClientDetails {
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn address(
        mut self,
        street: impl Into<String>,
        city: impl Into<String>,
        province: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        self.address = Some(street.into());
        self.city = Some(city.into());
        self.province = Some(province.into());
        self.postal_code = Some(postal_code.into());
        self
    }
}

/// Open a new account for an existing client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccountCmd {
    pub client_id: Uuid,
    pub kind: AccountKind,
    pub opening_balance: Money,
    pub status: AccountStatus,
    /// Defaults to today when unset.
    pub open_date: Option<NaiveDate>,
}

impl OpenAccountCmd {
    #[must_use]
    pub fn new(client_id: Uuid, kind: AccountKind) -> Self {
        Self {
            client_id,
            kind,
            opening_balance: Money::ZERO,
            status: AccountStatus::Active,
            open_date: None,
        }
    }

    #[must_use]
    pub fn opening_balance(mut self, balance: Money) -> Self {
        self.opening_balance = balance;
        self
    }

    #[must_use]
    pub fn status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn open_date(mut self, date: NaiveDate) -> Self {
        self.open_date = Some(date);
        self
    }
}

/// Edit an account. Unset fields are left untouched; number and balance are
/// not editable here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountCmd {
    pub account_id: Uuid,
    pub kind: Option<AccountKind>,
    pub status: Option<AccountStatus>,
    pub client_id: Option<Uuid>,
}

impl UpdateAccountCmd {
    #[must_use]
    pub fn new(account_id: Uuid) -> Self {
        Self {
            account_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: AccountKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn status(mut self, status: AccountStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn client_id(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

/// Post a transaction against an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTransactionCmd {
    pub account_id: Uuid,
    pub amount: Money,
    pub kind: TransactionKind,
    pub description: Option<String>,
}

impl PostTransactionCmd {
    #[must_use]
    pub fn new(account_id: Uuid, kind: TransactionKind, amount: Money) -> Self {
        Self {
            account_id,
            amount,
            kind,
            description: None,
        }
    }

    #[must_use]
    pub fn deposit(account_id: Uuid, amount: Money) -> Self {
        Self::new(account_id, TransactionKind::Deposit, amount)
    }

    #[must_use]
    pub fn withdrawal(account_id: Uuid, amount: Money) -> Self {
        Self::new(account_id, TransactionKind::Withdrawal, amount)
    }

    #[must_use]
    pub fn transfer(account_id: Uuid, amount: Money) -> Self {
        Self::new(account_id, TransactionKind::Transfer, amount)
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Edit a posted transaction.
///
/// Balance-affecting fields (`amount`, `kind`, `account_id`) are re-posted:
/// the old effect is reversed and the new one validated and applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTransactionCmd {
    pub transaction_id: Uuid,
    pub amount: Option<Money>,
    pub kind: Option<TransactionKind>,
    pub account_id: Option<Uuid>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// `true` when the edit changes the balance effect.
    #[must_use]
    pub fn touches_balance(&self) -> bool {
        self.amount.is_some() || self.kind.is_some() || self.account_id.is_some()
    }
}
