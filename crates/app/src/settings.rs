//! Settings for the `bank` binary.
//!
//! Values come from an optional TOML file (`settings.toml` by default) and are
//! overridden by `BANK_`-prefixed environment variables, e.g.
//! `BANK_LEVEL=debug` or `BANK_PAGE_SIZE=25`. Command-line flags win over both.

use config::{Config, ConfigError, Environment, File};
use engine::identifiers::DEFAULT_MAX_ATTEMPTS;
use engine::listing::DEFAULT_PAGE_SIZE;
use serde::Deserialize;

pub const DEFAULT_SETTINGS_PATH: &str = "settings";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level applied to the binary and the engine.
    pub level: String,
    pub database: Database,
    pub page_size: u64,
    pub identifier_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            database: Database::Sqlite("./bank.db".to_string()),
            page_size: DEFAULT_PAGE_SIZE,
            identifier_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_SETTINGS_PATH)).required(false))
            .add_source(Environment::with_prefix("BANK").try_parsing(true))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_to_a_local_sqlite_file() {
        let settings = Settings::default();
        assert_eq!(settings.database.url(), "sqlite:./bank.db?mode=rwc");
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.identifier_attempts, 32);
    }

    #[test]
    fn reads_overrides_from_toml() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                "level = \"debug\"\npage_size = 25\ndatabase = \"memory\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.level, "debug");
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.database, Database::Memory);
        assert_eq!(settings.identifier_attempts, 32);
    }
}
