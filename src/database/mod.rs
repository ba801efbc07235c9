//! sqlx implementations of the migrator's database seams.

mod backend;
mod executor;

pub use backend::{ConnectOptionsOf, PostgresBackend, SqliteBackend, SqlxBackend};
pub use executor::{SqlxExecutor, SqlxTrackingStore, SqlxTransaction};

use crate::config::MigrationConfig;
use crate::source::StaticSource;

/// The preparation scripts that create the tracking schema and table.
///
/// Empty when tracking is off: nothing will read or write the table, so
/// there is no reason to create it.
pub fn bootstrap_source<B: SqlxBackend>(config: &MigrationConfig) -> StaticSource {
    if config.keep_track_of_migration {
        StaticSource::new(B::bootstrap_scripts())
    } else {
        StaticSource::new(Vec::new())
    }
}
