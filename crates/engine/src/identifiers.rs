//! Public account and transaction numbers.
//!
//! Numbers are 10-digit strings distinct from the internal record key. They
//! are drawn from a [`NumberSource`] and probed against the store until a free
//! one is found, with a bounded number of attempts. Numbers are not reserved:
//! the unique index on the number column rejects a racing insert, and the
//! caller retries the whole write with a fresh number.

use std::{fmt, sync::Arc};

use rand::Rng;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, store};

/// Smallest valid number (first 10-digit value).
pub const MIN_NUMBER: u64 = 1_000_000_000;
/// Largest valid number.
pub const MAX_NUMBER: u64 = 9_999_999_999;
/// Default bound on generate-and-probe attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Account,
    Transaction,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => f.write_str("account"),
            Self::Transaction => f.write_str("transaction"),
        }
    }
}

/// A validated 10-digit public number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Builds an identifier from a number in `MIN_NUMBER..=MAX_NUMBER`.
    pub fn from_number(value: u64) -> ResultEngine<Self> {
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&value) {
            return Err(EngineError::InvalidInput(format!(
                "number {value} is not 10 digits"
            )));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.len() != 10 || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::InvalidInput(format!(
                "\"{value}\" is not a 10-digit number"
            )));
        }
        let number: u64 = value
            .parse()
            .map_err(|_| EngineError::InvalidInput(format!("\"{value}\" is not a number")))?;
        Self::from_number(number)
    }
}

impl TryFrom<String> for Identifier {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// Supplies candidate numbers to the generator.
pub trait NumberSource: Send + Sync + fmt::Debug {
    fn next_candidate(&self) -> u64;
}

/// Uniform draws over the 10-digit range.
#[derive(Debug, Default)]
pub struct RandomSource;

impl NumberSource for RandomSource {
    fn next_candidate(&self) -> u64 {
        rand::thread_rng().gen_range(MIN_NUMBER..=MAX_NUMBER)
    }
}

/// Generate-and-probe loop over a [`NumberSource`].
#[derive(Clone, Debug)]
pub struct IdentifierGenerator {
    source: Arc<dyn NumberSource>,
    max_attempts: u32,
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self {
            source: Arc::new(RandomSource),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl IdentifierGenerator {
    #[must_use]
    pub fn new(source: Arc<dyn NumberSource>, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns a number of `kind` that is not in use at probe time.
    pub async fn generate_unique<C: ConnectionTrait>(
        &self,
        db: &C,
        kind: IdentifierKind,
    ) -> ResultEngine<Identifier> {
        for attempt in 1..=self.max_attempts {
            let raw = self.source.next_candidate();
            let Ok(candidate) = Identifier::from_number(raw) else {
                tracing::warn!(%kind, raw, "number source produced an out-of-range candidate");
                continue;
            };
            if !store::exists_identifier(db, kind, candidate.as_str()).await? {
                return Ok(candidate);
            }
            tracing::debug!(%kind, attempt, number = %candidate, "number already in use");
        }
        tracing::error!(%kind, attempts = self.max_attempts, "number space exhausted");
        Err(EngineError::IdentifierExhausted(kind, self.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_source_stays_in_range() {
        let source = RandomSource;
        for _ in 0..1_000 {
            let value = source.next_candidate();
            assert!((MIN_NUMBER..=MAX_NUMBER).contains(&value));
            assert_eq!(Identifier::from_number(value).unwrap().as_str().len(), 10);
        }
    }

    #[test]
    fn identifier_rejects_wrong_length() {
        assert!(Identifier::from_number(999_999_999).is_err());
        assert!(Identifier::from_number(10_000_000_000).is_err());
        assert!(Identifier::try_from("123").is_err());
        assert!(Identifier::try_from("0123456789").is_err());
        assert!(Identifier::try_from("12345678a0").is_err());
        assert_eq!(
            Identifier::try_from(" 1234567890 ").unwrap().as_str(),
            "1234567890"
        );
    }

    #[test]
    fn generator_has_at_least_one_attempt() {
        let generator = IdentifierGenerator::new(Arc::new(RandomSource), 0);
        assert_eq!(generator.max_attempts(), 1);
    }
}
