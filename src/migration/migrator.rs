use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::executor::{ScriptTransaction, TransactionalExecutor};
use super::observer::{MigrationEvent, MigrationObserver, Phase};
use super::tracking::TrackingStore;
use super::{MigrationError, Result};
use crate::config::MigrationConfig;
use crate::source::{MigrationScript, ScriptSource};
use crate::template::{RenderContext, TemplateRenderer};

/// Terminal state of a script that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    Applied,
    Skipped,
}

/// What happened to each script of one phase, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub outcomes: Vec<(String, ScriptOutcome)>,
}

impl MigrationReport {
    pub fn applied(&self) -> Vec<&str> {
        self.with_outcome(ScriptOutcome::Applied)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.with_outcome(ScriptOutcome::Skipped)
    }

    fn with_outcome(&self, outcome: ScriptOutcome) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == outcome)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Result of a two-phase run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub bootstrap: MigrationReport,
    pub migrations: MigrationReport,
}

/// Applies migration scripts one at a time, each in its own transaction.
///
/// Scripts run strictly in source order. A script already present in the
/// tracking table is skipped; the first failure rolls back that script's
/// transaction and stops the run, leaving every later script untouched.
///
/// Two migrators running against the same database at once are not
/// coordinated: callers must make sure only one run is active.
pub struct Migrator<E, K, R> {
    executor: E,
    tracking: K,
    renderer: R,
    variables: BTreeMap<String, Value>,
    observer: Option<Arc<dyn MigrationObserver>>,
}

impl<E, K, R> Migrator<E, K, R>
where
    E: TransactionalExecutor,
    K: TrackingStore<E::Transaction>,
    R: TemplateRenderer,
{
    pub fn new(executor: E, tracking: K, renderer: R) -> Self {
        Self {
            executor,
            tracking,
            renderer,
            variables: BTreeMap::new(),
            observer: None,
        }
    }

    /// Extra values exposed to every script next to `migration`.
    pub fn with_variables(mut self, variables: BTreeMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn notify(&self, event: MigrationEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Two-phase run: the preparation scripts with tracking forced off, then
    /// the user scripts with `config`.
    ///
    /// Both sources are read before anything executes, so an unreadable
    /// source aborts the run without touching the database.
    pub async fn start(
        &self,
        bootstrap: &dyn ScriptSource,
        migrations: &dyn ScriptSource,
        config: &MigrationConfig,
    ) -> Result<RunReport> {
        let bootstrap_scripts = bootstrap.load_all().await?;
        let scripts = migrations.load_all().await?;

        let bootstrap = self
            .apply_scripts(Phase::Bootstrap, &bootstrap_scripts, &config.untracked())
            .await?;
        let migrations = self
            .apply_scripts(Phase::Migrations, &scripts, config)
            .await?;

        Ok(RunReport {
            bootstrap,
            migrations,
        })
    }

    /// Applies every script of `source` in order.
    pub async fn apply(
        &self,
        source: &dyn ScriptSource,
        config: &MigrationConfig,
    ) -> Result<MigrationReport> {
        let scripts = source.load_all().await?;
        self.apply_scripts(Phase::Migrations, &scripts, config).await
    }

    pub async fn apply_scripts(
        &self,
        phase: Phase,
        scripts: &[MigrationScript],
        config: &MigrationConfig,
    ) -> Result<MigrationReport> {
        self.notify(MigrationEvent::PhaseStarted {
            phase,
            scripts: scripts.len(),
        });

        let context = RenderContext::new(config).with_variables(&self.variables);
        let mut report = MigrationReport::default();

        for script in scripts {
            let outcome = self.apply_one(script, config, &context).await?;
            report.outcomes.push((script.identifier.clone(), outcome));
        }

        self.notify(MigrationEvent::PhaseFinished {
            phase,
            applied: report.applied().len(),
            skipped: report.skipped().len(),
        });
        Ok(report)
    }

    async fn apply_one(
        &self,
        script: &MigrationScript,
        config: &MigrationConfig,
        context: &RenderContext,
    ) -> Result<ScriptOutcome> {
        let identifier = script.identifier.as_str();

        self.notify(MigrationEvent::Connecting { identifier });
        let mut tx = self
            .executor
            .begin()
            .await
            .map_err(MigrationError::Connection)?;

        match self.run_in_transaction(&mut tx, script, config, context).await {
            Ok(ScriptOutcome::Skipped) => {
                // Nothing was written; ending the transaction just frees the connection
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(identifier, error = %e, "Failed to close read-only transaction");
                }
                self.notify(MigrationEvent::Skipped { identifier });
                self.notify(MigrationEvent::Released { identifier });
                Ok(ScriptOutcome::Skipped)
            }
            Ok(ScriptOutcome::Applied) => {
                self.notify(MigrationEvent::Committing { identifier });
                let committed = tx
                    .commit()
                    .await
                    .map_err(|e| MigrationError::execution(identifier, e));
                self.notify(MigrationEvent::Released { identifier });

                match committed {
                    Ok(()) => {
                        self.notify(MigrationEvent::Applied { identifier });
                        Ok(ScriptOutcome::Applied)
                    }
                    Err(err) => {
                        let message = err.to_string();
                        self.notify(MigrationEvent::Failed {
                            identifier,
                            error: &message,
                        });
                        Err(err)
                    }
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.notify(MigrationEvent::Failed {
                    identifier,
                    error: &message,
                });

                self.notify(MigrationEvent::RollingBack { identifier });
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        identifier,
                        error = %rollback_err,
                        "Rollback failed; the connection is discarded"
                    );
                }
                self.notify(MigrationEvent::Released { identifier });
                Err(err)
            }
        }
    }

    /// Steps between acquiring the transaction and committing it. Nothing in
    /// here ends the transaction; the caller commits or rolls back.
    async fn run_in_transaction(
        &self,
        tx: &mut E::Transaction,
        script: &MigrationScript,
        config: &MigrationConfig,
        context: &RenderContext,
    ) -> Result<ScriptOutcome> {
        let identifier = script.identifier.as_str();

        self.notify(MigrationEvent::Checking { identifier });
        if self.tracking.is_applied(tx, config, identifier).await? {
            return Ok(ScriptOutcome::Skipped);
        }
        if !config.keep_track_of_migration {
            tracing::debug!(identifier, "Skip keeping track of migration");
        }

        self.notify(MigrationEvent::Rendering { identifier });
        let sql = self
            .renderer
            .render(&script.raw_text, context)
            .map_err(|source| MigrationError::Template {
                identifier: identifier.to_string(),
                source,
            })?;

        self.notify(MigrationEvent::Executing { identifier });
        tx.execute(&sql)
            .await
            .map_err(|e| MigrationError::execution(identifier, e))?;

        if config.keep_track_of_migration {
            self.notify(MigrationEvent::Recording { identifier });
            self.tracking.record_applied(tx, config, identifier).await?;
        }

        Ok(ScriptOutcome::Applied)
    }
}
