//! Wires a loaded [`AppConfig`] to the migrator and the script source.

use anyhow::{Context, Result};
use sqlx::{Database, Executor};
use std::sync::Arc;

use crate::config::{AppConfig, DatabaseKind};
use crate::database::{
    bootstrap_source, PostgresBackend, SqliteBackend, SqlxBackend, SqlxExecutor,
    SqlxTrackingStore, SqlxTransaction,
};
use crate::migration::{Migrator, RunReport, TrackingStore, TracingObserver, TransactionalExecutor};
use crate::source::{FileSystemSource, ScriptSource, StaticSource};
use crate::template::JinjaRenderer;

/// Applies the preparation scripts and then every pending script of the
/// configured source.
pub async fn start_migration(config: &AppConfig) -> Result<RunReport> {
    match DatabaseKind::from_url(&config.database.url)? {
        DatabaseKind::Postgres => run::<PostgresBackend>(config).await,
        DatabaseKind::Sqlite => run::<SqliteBackend>(config).await,
    }
}

async fn run<B>(config: &AppConfig) -> Result<RunReport>
where
    B: SqlxBackend,
    SqlxExecutor<B>: TransactionalExecutor<Transaction = SqlxTransaction<B>>,
    SqlxTrackingStore<B>: TrackingStore<SqlxTransaction<B>>,
    for<'c> &'c mut <B::DB as Database>::Connection: Executor<'c, Database = B::DB>,
    for<'q> <B::DB as Database>::Arguments<'q>: sqlx::IntoArguments<'q, B::DB>,
{
    let migration_config = B::resolve_migration_config(&config.migration);
    let source = FileSystemSource::from_config(&config.source);
    let bootstrap = bootstrap_source::<B>(&migration_config);

    tracing::info!(
        backend = B::NAME,
        directory = %source.directory().display(),
        table = %migration_config.qualified_table(),
        tracking = migration_config.keep_track_of_migration,
        "Starting migration"
    );

    // Read the scripts before touching the database
    let scripts = StaticSource::new(source.load_all().await?);

    let executor = SqlxExecutor::<B>::connect(&config.database)
        .await
        .context("Failed to connect to the database")?;

    let migrator = Migrator::new(executor, SqlxTrackingStore::<B>::new(), JinjaRenderer::new())
        .with_variables(config.template.variables.clone())
        .with_observer(Arc::new(TracingObserver));

    let result = migrator.start(&bootstrap, &scripts, &migration_config).await;
    migrator.executor().close().await;

    let report = result?;
    tracing::info!(
        applied = report.migrations.applied().len(),
        skipped = report.migrations.skipped().len(),
        "Migration finished"
    );
    Ok(report)
}

/// Creates a new script in the configured directory and returns its
/// identifier.
pub async fn add_migration(config: &AppConfig, name: &str, content: &str) -> Result<String> {
    let source = FileSystemSource::from_config(&config.source);
    let identifier = source
        .create(name, content)
        .await
        .with_context(|| format!("Failed to add migration '{}'", name))?;

    tracing::info!(identifier = %identifier, "Migration created");
    Ok(identifier)
}

/// Name of the sqlx driver behind `config`, for diagnostics.
pub fn backend_name(config: &AppConfig) -> Result<&'static str> {
    Ok(match DatabaseKind::from_url(&config.database.url)? {
        DatabaseKind::Postgres => <PostgresBackend as SqlxBackend>::NAME,
        DatabaseKind::Sqlite => <SqliteBackend as SqlxBackend>::NAME,
    })
}
