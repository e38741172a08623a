//! Filters and pagination for browse/search operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AccountKind, AccountStatus, TransactionKind};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Builds a page, clamping `size` to `1..=MAX_PAGE_SIZE` and `number` to `>= 1`.
    #[must_use]
    pub fn new(number: u64, size: u64) -> Self {
        Self {
            number: number.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Same bounds as [`Page::new`], for pages built from their public fields.
    pub(crate) fn clamped(self) -> Self {
        Self::new(self.number, self.size)
    }

    /// Zero-based index used by the paginator.
    pub(crate) fn index(self) -> u64 {
        self.number.max(1) - 1
    }
}

/// One page of results plus totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: Page,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Paged<T> {
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page.number < self.total_pages
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientListFilter {
    /// Case-insensitive match against first name, last name or email.
    pub search: Option<String>,
    pub city: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountListFilter {
    pub client_id: Option<Uuid>,
    pub kind: Option<AccountKind>,
    pub status: Option<AccountStatus>,
    /// Prefix match on the public number.
    pub number_prefix: Option<String>,
    /// Substring match on the number or on the owner's first or last name.
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionListFilter {
    pub account_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Substring match on the description or the transaction number.
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(Page::new(0, 0), Page { number: 1, size: 1 });
        assert_eq!(Page::new(3, 1_000).size, MAX_PAGE_SIZE);
        assert_eq!(Page::new(3, 25).index(), 2);

        let raw = Page { number: 0, size: 0 };
        assert_eq!(raw.clamped(), Page { number: 1, size: 1 });
        assert_eq!(Page { number: 2, size: 500 }.clamped().size, MAX_PAGE_SIZE);
    }
}
