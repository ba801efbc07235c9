use std::fmt;

/// Which script set a run is working through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built-in, untracked preparation scripts.
    Bootstrap,
    /// Scripts from the configured source.
    Migrations,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Bootstrap => write!(f, "bootstrap"),
            Phase::Migrations => write!(f, "migrations"),
        }
    }
}

/// Lifecycle points of a run, reported in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationEvent<'a> {
    PhaseStarted { phase: Phase, scripts: usize },
    Connecting { identifier: &'a str },
    Checking { identifier: &'a str },
    Skipped { identifier: &'a str },
    Rendering { identifier: &'a str },
    Executing { identifier: &'a str },
    Recording { identifier: &'a str },
    Committing { identifier: &'a str },
    Applied { identifier: &'a str },
    RollingBack { identifier: &'a str },
    Released { identifier: &'a str },
    Failed { identifier: &'a str, error: &'a str },
    PhaseFinished { phase: Phase, applied: usize, skipped: usize },
}

/// Receives progress notifications. Never influences control flow.
pub trait MigrationObserver: Send + Sync {
    fn on_event(&self, event: &MigrationEvent<'_>);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_event(&self, event: &MigrationEvent<'_>) {
        match *event {
            MigrationEvent::PhaseStarted { phase, scripts } => {
                tracing::info!(%phase, scripts, "Starting phase");
            }
            MigrationEvent::Connecting { identifier } => {
                tracing::debug!(identifier, "Connecting to the database");
            }
            MigrationEvent::Checking { identifier } => {
                tracing::debug!(identifier, "Checking migration status");
            }
            MigrationEvent::Skipped { identifier } => {
                tracing::info!(identifier, "Skipped (already applied)");
            }
            MigrationEvent::Rendering { identifier } => {
                tracing::debug!(identifier, "Rendering migration script");
            }
            MigrationEvent::Executing { identifier } => {
                tracing::info!(identifier, "Running migration script");
            }
            MigrationEvent::Recording { identifier } => {
                tracing::debug!(identifier, "Keeping track of the migration");
            }
            MigrationEvent::Committing { identifier } => {
                tracing::debug!(identifier, "Committing the changes");
            }
            MigrationEvent::Applied { identifier } => {
                tracing::info!(identifier, "Migration applied");
            }
            MigrationEvent::RollingBack { identifier } => {
                tracing::warn!(identifier, "Rolling back the transaction");
            }
            MigrationEvent::Released { identifier } => {
                tracing::debug!(identifier, "Connection released");
            }
            MigrationEvent::Failed { identifier, error } => {
                tracing::error!(identifier, error, "Error in applying the migration");
            }
            MigrationEvent::PhaseFinished {
                phase,
                applied,
                skipped,
            } => {
                tracing::info!(%phase, applied, skipped, "Phase finished");
            }
        }
    }
}
