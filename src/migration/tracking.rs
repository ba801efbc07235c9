use super::executor::ScriptTransaction;
use super::Result;
use crate::config::MigrationConfig;

/// Records which migrations have been applied.
///
/// Both operations run inside the caller's transaction `T`. When
/// `config.keep_track_of_migration` is false, `is_applied` always reports
/// `false` and `record_applied` does nothing.
pub trait TrackingStore<T: ScriptTransaction> {
    async fn is_applied(
        &self,
        tx: &mut T,
        config: &MigrationConfig,
        identifier: &str,
    ) -> Result<bool>;

    /// Fails with [`MigrationError::DuplicateRecord`](super::MigrationError::DuplicateRecord)
    /// when `identifier` is already present.
    async fn record_applied(
        &self,
        tx: &mut T,
        config: &MigrationConfig,
        identifier: &str,
    ) -> Result<()>;
}
