use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, Database};
use std::str::FromStr;

use crate::config::{DatabaseConfig, MigrationConfig};
use crate::source::MigrationScript;

/// Options type sqlx uses to open a connection for `DB`.
pub type ConnectOptionsOf<DB> = <<DB as Database>::Connection as Connection>::Options;

/// Trait abstracting database-specific behavior for the sqlx executor.
///
/// Tracking queries have default implementations using `?` placeholders
/// (SQLite style). Override where syntax differs (Postgres uses $1).
pub trait SqlxBackend: Send + Sync + 'static {
    type DB: Database;

    const NAME: &'static str;

    /// Parses the configured URL and applies the per-connection settings.
    fn connect_options(config: &DatabaseConfig) -> Result<ConnectOptionsOf<Self::DB>, sqlx::Error>;

    /// Adjusts the tracking settings to what this database understands.
    fn resolve_migration_config(config: &MigrationConfig) -> MigrationConfig {
        config.clone()
    }

    // ========================================================================
    // Preparation scripts (templated, idempotent, never tracked)
    // ========================================================================

    fn bootstrap_scripts() -> Vec<MigrationScript>;

    // ========================================================================
    // Tracking table queries
    // ========================================================================

    fn count_applied_sql(qualified_table: &str) -> String {
        format!("SELECT COUNT(*) FROM {} WHERE identifier = ?", qualified_table)
    }

    fn insert_applied_sql(qualified_table: &str) -> String {
        format!("INSERT INTO {} (identifier) VALUES (?)", qualified_table)
    }
}

// ============================================================================
// PostgreSQL Backend
// ============================================================================

pub struct PostgresBackend;

impl SqlxBackend for PostgresBackend {
    type DB = sqlx::Postgres;

    const NAME: &'static str = "postgres";

    fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, sqlx::Error> {
        let mut options = PgConnectOptions::from_str(&config.url)?;
        if let Some(timeout) = config.statement_timeout() {
            options = options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }
        Ok(options)
    }

    fn bootstrap_scripts() -> Vec<MigrationScript> {
        vec![
            MigrationScript::new(
                "0001_create-tracking-schema",
                r#"CREATE SCHEMA IF NOT EXISTS "{{ migration.schema_name }}";"#,
            ),
            MigrationScript::new(
                "0002_create-tracking-table",
                r#"CREATE TABLE IF NOT EXISTS {{ migration.qualified_table }} (
    record_id BIGSERIAL PRIMARY KEY,
    identifier TEXT NOT NULL UNIQUE,
    "timestamp" TIMESTAMPTZ NOT NULL DEFAULT now()
);"#,
            ),
        ]
    }

    // Postgres uses $1, $2, etc. for placeholders
    fn count_applied_sql(qualified_table: &str) -> String {
        format!("SELECT COUNT(*) FROM {} WHERE identifier = $1", qualified_table)
    }

    fn insert_applied_sql(qualified_table: &str) -> String {
        format!("INSERT INTO {} (identifier) VALUES ($1)", qualified_table)
    }
}

// ============================================================================
// SQLite Backend
// ============================================================================

/// SQLite has no schemas; the schema name is the name of an attached
/// database, `main` for the primary file.
pub struct SqliteBackend;

impl SqliteBackend {
    pub const DEFAULT_SCHEMA: &'static str = "main";
}

impl SqlxBackend for SqliteBackend {
    type DB = sqlx::Sqlite;

    const NAME: &'static str = "sqlite";

    fn connect_options(config: &DatabaseConfig) -> Result<SqliteConnectOptions, sqlx::Error> {
        let mut options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        if let Some(timeout) = config.statement_timeout() {
            options = options.busy_timeout(timeout);
        }
        Ok(options)
    }

    /// The Postgres default schema `public` means the primary database here.
    fn resolve_migration_config(config: &MigrationConfig) -> MigrationConfig {
        let mut resolved = config.clone();
        if resolved.schema_name == MigrationConfig::default().schema_name {
            resolved.schema_name = Self::DEFAULT_SCHEMA.to_string();
        }
        resolved
    }

    fn bootstrap_scripts() -> Vec<MigrationScript> {
        vec![MigrationScript::new(
            "0001_create-tracking-table",
            r#"CREATE TABLE IF NOT EXISTS {{ migration.qualified_table }} (
    record_id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE,
    "timestamp" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);"#,
        )]
    }

    // SQLite uses default `?` placeholders - no overrides needed for queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        let table = MigrationConfig::default().qualified_table();
        assert_eq!(
            PostgresBackend::count_applied_sql(&table),
            r#"SELECT COUNT(*) FROM "public"."_migrations" WHERE identifier = $1"#
        );
        assert_eq!(
            SqliteBackend::insert_applied_sql(&table),
            r#"INSERT INTO "public"."_migrations" (identifier) VALUES (?)"#
        );
    }

    #[test]
    fn test_sqlite_maps_default_schema_to_main() {
        let resolved = SqliteBackend::resolve_migration_config(&MigrationConfig::default());
        assert_eq!(resolved.schema_name, "main");

        let custom = MigrationConfig {
            schema_name: "audit".to_string(),
            ..Default::default()
        };
        assert_eq!(
            SqliteBackend::resolve_migration_config(&custom).schema_name,
            "audit"
        );
        assert_eq!(
            PostgresBackend::resolve_migration_config(&MigrationConfig::default()).schema_name,
            "public"
        );
    }

    #[test]
    fn test_bootstrap_identifiers_are_ordered() {
        for scripts in [
            PostgresBackend::bootstrap_scripts(),
            SqliteBackend::bootstrap_scripts(),
        ] {
            let ids: Vec<_> = scripts.iter().map(|s| s.identifier.clone()).collect();
            let mut sorted = ids.clone();
            sorted.sort();
            assert_eq!(ids, sorted);
            assert!(scripts
                .iter()
                .any(|s| s.raw_text.contains("CREATE TABLE IF NOT EXISTS")));
        }
    }
}
