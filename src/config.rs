use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::template::MIGRATION_KEY;

/// Prefix of environment variables overriding file settings,
/// e.g. `TIDEMARK__DATABASE__URL`.
pub const ENV_PREFIX: &str = "TIDEMARK";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migration: MigrationConfig,
    pub source: SourceConfig,
    pub template: TemplateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Per-statement limit; 0 disables it.
    pub statement_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            min_connections: 0,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            statement_timeout_secs: 0,
        }
    }
}

impl DatabaseConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_secs > 0).then(|| Duration::from_secs(self.statement_timeout_secs))
    }
}

/// Where applied migrations are recorded and whether they are recorded at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub schema_name: String,
    pub table_name: String,
    pub keep_track_of_migration: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            schema_name: "public".to_string(),
            table_name: "_migrations".to_string(),
            keep_track_of_migration: true,
        }
    }
}

impl MigrationConfig {
    /// Same table settings with tracking switched off.
    pub fn untracked(&self) -> Self {
        Self {
            keep_track_of_migration: false,
            ..self.clone()
        }
    }

    /// `"schema"."table"`, quoted for direct use in SQL.
    pub fn qualified_table(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.schema_name),
            quote_identifier(&self.table_name)
        )
    }
}

/// Double-quotes an SQL identifier, doubling any embedded quotes.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub directory: PathBuf,
    /// Only files ending with this are migrations. Empty accepts every file.
    pub file_extension: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("migrations"),
            file_extension: ".sql".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn extension(&self) -> Option<&str> {
        (!self.file_extension.is_empty()).then_some(self.file_extension.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Extra values exposed to every script next to `migration`.
    pub variables: BTreeMap<String, Value>,
}

impl AppConfig {
    /// Loads defaults, then `path`, then `TIDEMARK__*` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration '{}'", path.display()))?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Relative migration directories are relative to the config file
        if app_config.source.directory.is_relative() {
            if let Some(parent) = path.parent() {
                app_config.source.directory = parent.join(&app_config.source.directory);
            }
        }

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database.url must be set");
        }
        DatabaseKind::from_url(&self.database.url)?;

        if self.database.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        if self.database.min_connections > self.database.max_connections {
            bail!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.migration.schema_name.trim().is_empty() {
            bail!("migration.schema_name must not be empty");
        }
        if self.migration.table_name.trim().is_empty() {
            bail!("migration.table_name must not be empty");
        }

        if self.template.variables.contains_key(MIGRATION_KEY) {
            bail!(
                "template.variables.{} is reserved for the migration settings",
                MIGRATION_KEY
            );
        }

        Ok(())
    }
}

/// Database flavour, chosen from the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    Sqlite,
}

impl DatabaseKind {
    pub fn from_url(database_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(database_url)
            .with_context(|| format!("Invalid database url '{}'", redact(database_url)))?;

        match parsed.scheme() {
            "postgres" | "postgresql" => Ok(DatabaseKind::Postgres),
            "sqlite" => Ok(DatabaseKind::Sqlite),
            other => bail!("Unsupported database scheme '{}'", other),
        }
    }
}

/// Hides the password part of a connection URL for error messages.
fn redact(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        _ => database_url.to_string(),
    }
}
