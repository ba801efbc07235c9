//! Ordered, transactional application of migration scripts.
//!
//! ## Lifecycle of a script
//!
//! Each script gets its own pooled connection and transaction:
//!
//! 1. the tracking table is consulted; an already applied script is skipped
//! 2. the script is rendered against the [`RenderContext`](crate::template::RenderContext)
//! 3. the rendered SQL is executed verbatim
//! 4. the identifier is inserted into the tracking table (tracking enabled only)
//! 5. the transaction commits
//!
//! Any failure in 1-4 rolls the transaction back and stops the run.

mod error;
mod executor;
mod migrator;
mod observer;
mod tracking;

pub use error::{MigrationError, Result};
pub use executor::{ScriptTransaction, TransactionalExecutor};
pub use migrator::{MigrationReport, Migrator, RunReport, ScriptOutcome};
pub use observer::{MigrationEvent, MigrationObserver, Phase, TracingObserver};
pub use tracking::TrackingStore;
