//! Database capabilities the migrator needs.
//!
//! The migrator only ever talks to the database through a transaction handed
//! out by a [`TransactionalExecutor`]. Every tracking lookup, the script body
//! and the tracking insert share that transaction, so they commit or roll
//! back together.

/// One script's worth of work on a dedicated connection.
///
/// Dropping a transaction without committing rolls it back and returns the
/// connection to its pool.
pub trait ScriptTransaction {
    /// Runs `sql` as a single raw batch. Statements are not split or parsed.
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error>;

    async fn commit(self) -> Result<(), sqlx::Error>;

    async fn rollback(self) -> Result<(), sqlx::Error>;
}

/// Hands out transactions, each on its own pooled connection.
pub trait TransactionalExecutor {
    type Transaction: ScriptTransaction;

    /// Acquires a connection and opens a transaction on it.
    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error>;
}
