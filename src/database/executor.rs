use sqlx::pool::PoolOptions;
use sqlx::{Database, Executor, Pool, Transaction};
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;

use super::backend::SqlxBackend;
use crate::config::{DatabaseConfig, MigrationConfig};
use crate::migration::{
    MigrationError, Result, ScriptTransaction, TrackingStore, TransactionalExecutor,
};

// ============================================================================
// Executor
// ============================================================================

/// Pool-backed [`TransactionalExecutor`] for any sqlx backend.
pub struct SqlxExecutor<B: SqlxBackend> {
    pool: Pool<B::DB>,
    _backend: PhantomData<B>,
}

impl<B: SqlxBackend> SqlxExecutor<B> {
    /// Builds the pool and makes sure the server is reachable.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = B::connect_options(config).map_err(MigrationError::Connection)?;

        let pool = PoolOptions::<B::DB>::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(config.idle_timeout())
            .connect_with(options)
            .await
            .map_err(MigrationError::Connection)?;

        tracing::info!(backend = B::NAME, "Connected to the database");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Pool<B::DB>) -> Self {
        Self {
            pool,
            _backend: PhantomData,
        }
    }

    pub fn pool(&self) -> &Pool<B::DB> {
        &self.pool
    }

    /// Waits for every connection to be returned, then closes them.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!(backend = B::NAME, "Database connection pool closed");
    }
}

impl<B> TransactionalExecutor for SqlxExecutor<B>
where
    B: SqlxBackend,
    for<'c> &'c mut <B::DB as Database>::Connection: Executor<'c, Database = B::DB>,
{
    type Transaction = SqlxTransaction<B>;

    async fn begin(&self) -> std::result::Result<SqlxTransaction<B>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(SqlxTransaction { tx })
    }
}

impl<B: SqlxBackend> Debug for SqlxExecutor<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlxExecutor")
            .field("backend", &B::NAME)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// An open transaction owning its pooled connection.
pub struct SqlxTransaction<B: SqlxBackend> {
    tx: Transaction<'static, B::DB>,
}

impl<B: SqlxBackend> SqlxTransaction<B> {
    /// The connection the transaction runs on.
    pub fn connection(&mut self) -> &mut <B::DB as Database>::Connection {
        &mut self.tx
    }
}

impl<B> ScriptTransaction for SqlxTransaction<B>
where
    B: SqlxBackend,
    for<'c> &'c mut <B::DB as Database>::Connection: Executor<'c, Database = B::DB>,
{
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        sqlx::raw_sql(sql).execute(self.connection()).await?;
        Ok(())
    }

    async fn commit(self) -> std::result::Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self) -> std::result::Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

// ============================================================================
// Tracking store
// ============================================================================

/// Tracking table access through the script's own transaction.
pub struct SqlxTrackingStore<B: SqlxBackend> {
    _backend: PhantomData<B>,
}

impl<B: SqlxBackend> SqlxTrackingStore<B> {
    pub fn new() -> Self {
        Self {
            _backend: PhantomData,
        }
    }
}

impl<B: SqlxBackend> Default for SqlxTrackingStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> TrackingStore<SqlxTransaction<B>> for SqlxTrackingStore<B>
where
    B: SqlxBackend,
    for<'c> &'c mut <B::DB as Database>::Connection: Executor<'c, Database = B::DB>,
    for<'r> i64: sqlx::Decode<'r, B::DB> + sqlx::Type<B::DB>,
    for<'r> &'r str: sqlx::Encode<'r, B::DB> + sqlx::Type<B::DB>,
    for<'q> <B::DB as Database>::Arguments<'q>: sqlx::IntoArguments<'q, B::DB>,
    usize: sqlx::ColumnIndex<<B::DB as Database>::Row>,
{
    async fn is_applied(
        &self,
        tx: &mut SqlxTransaction<B>,
        config: &MigrationConfig,
        identifier: &str,
    ) -> Result<bool> {
        if !config.keep_track_of_migration {
            return Ok(false);
        }

        let sql = B::count_applied_sql(&config.qualified_table());
        let count: i64 = sqlx::query_scalar::<B::DB, i64>(&sql)
            .bind(identifier)
            .fetch_one(tx.connection())
            .await
            .map_err(|e| MigrationError::execution(identifier, e))?;

        tracing::debug!(identifier, applied = count > 0, "Checked migration status");
        Ok(count > 0)
    }

    async fn record_applied(
        &self,
        tx: &mut SqlxTransaction<B>,
        config: &MigrationConfig,
        identifier: &str,
    ) -> Result<()> {
        if !config.keep_track_of_migration {
            return Ok(());
        }

        let sql = B::insert_applied_sql(&config.qualified_table());
        sqlx::query::<B::DB>(&sql)
            .bind(identifier)
            .execute(tx.connection())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    MigrationError::DuplicateRecord {
                        identifier: identifier.to_string(),
                    }
                }
                e => MigrationError::execution(identifier, e),
            })?;

        Ok(())
    }
}
