//! Migration execution: batch apply, batch rollback, explicit single runs.
//!
//! The runner is the only component that mutates the target schema or the
//! ledger. Units execute strictly sequentially (later units may depend on
//! earlier schema changes) and each unit's statements share one transaction
//! with its ledger write, so partial progress is always consistent and every
//! operation is safe to re-invoke.

use rusqlite::{Connection, OpenFlags};
use schema_migrate_catalog::{MigrationCatalog, MigratorConfig};
use schema_migrate_core::{Direction, MigrationId, MigrationUnit};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::ledger::Ledger;
use crate::status::{self, StatusEntry};

/// Outcome of an `up` invocation.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Batch the applied units were recorded under; `None` when nothing was
    /// pending.
    pub batch: Option<i64>,
    /// Ids applied in this invocation, in application order.
    pub applied: Vec<MigrationId>,
}

/// Outcome of a `down` invocation.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    /// Batch that was rolled back; `None` when the ledger was empty.
    pub batch: Option<i64>,
    /// Ids rolled back in this invocation, in reverse-application order.
    pub rolled_back: Vec<MigrationId>,
}

/// Outcome of an explicit single-unit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Forward run executed and recorded under the given batch.
    Applied {
        /// Batch allocated for the explicit apply.
        batch: i64,
    },
    /// Forward run requested for a unit that already had a record; nothing
    /// was executed.
    AlreadyApplied,
    /// Reverse run executed and the record removed.
    Reverted,
}

/// Orchestrates migration execution against one database.
///
/// # Examples
///
/// ```no_run
/// use schema_migrate_catalog::MigratorConfig;
/// use schema_migrate_sqlite::MigrationRunner;
///
/// let config = MigratorConfig::default();
/// let mut runner = MigrationRunner::from_config(&config).unwrap();
/// let report = runner.up().unwrap();
/// println!("applied {} unit(s)", report.applied.len());
/// ```
#[derive(Debug)]
pub struct MigrationRunner {
    conn: Connection,
    catalog: MigrationCatalog,
    ledger: Ledger,
}

impl MigrationRunner {
    /// Creates a runner from an open connection, a loaded catalog, and a
    /// ledger handle.
    pub fn new(conn: Connection, catalog: MigrationCatalog, ledger: Ledger) -> Self {
        Self {
            conn,
            catalog,
            ledger,
        }
    }

    /// Opens the configured database and loads the configured migrations
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Database`] if the database cannot be opened,
    /// [`MigrateError::Discovery`] if the catalog fails to load, or
    /// [`MigrateError::InvalidTableName`] for a bad ledger table name.
    pub fn from_config(config: &MigratorConfig) -> Result<Self> {
        let conn = Connection::open(&config.database)?;
        let catalog = MigrationCatalog::load(&config.migrations_dir)?;
        let ledger = Ledger::new(config.ledger_table.clone())?;
        Ok(Self::new(conn, catalog, ledger))
    }

    /// Opens the configured database read-only, for inspection commands
    /// that must not create it as a side effect.
    ///
    /// An absent database file behaves like an empty one: every catalog
    /// unit reports as pending and nothing is written to disk.
    ///
    /// # Errors
    ///
    /// Same as [`MigrationRunner::from_config`].
    pub fn from_config_read_only(config: &MigratorConfig) -> Result<Self> {
        let conn = if config.database.exists() {
            Connection::open_with_flags(
                &config.database,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            Connection::open_in_memory()?
        };
        let catalog = MigrationCatalog::load(&config.migrations_dir)?;
        let ledger = Ledger::new(config.ledger_table.clone())?;
        Ok(Self::new(conn, catalog, ledger))
    }

    /// Returns the catalog the runner executes from.
    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    /// Consumes the runner and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Applies all pending units in chronological order under one fresh
    /// batch.
    ///
    /// Each unit runs in its own transaction together with its ledger
    /// write. On failure the sequence stops: units applied earlier in this
    /// invocation keep their committed state and re-invoking `up` resumes
    /// from the failing unit.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::UnitFailed`] naming the failing unit and the
    /// number of units applied before it, or [`MigrateError::Conflict`] if
    /// a concurrent invocation applied a unit first.
    pub fn up(&mut self) -> Result<ApplyReport> {
        self.ledger.ensure(&self.conn)?;
        let applied_ids = self.ledger.applied_ids(&self.conn)?;
        let pending: Vec<MigrationUnit> = self
            .catalog
            .pending(&applied_ids)
            .into_iter()
            .cloned()
            .collect();

        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(ApplyReport {
                batch: None,
                applied: Vec::new(),
            });
        }

        let batch = self.ledger.next_batch(&self.conn)?;
        let mut applied = Vec::with_capacity(pending.len());
        for unit in &pending {
            if let Err(err) = self.apply_unit(unit, batch) {
                return Err(match err {
                    conflict @ MigrateError::Conflict { .. } => conflict,
                    other => MigrateError::UnitFailed {
                        id: unit.id.clone(),
                        applied_before: applied.len(),
                        source: Box::new(other),
                    },
                });
            }
            applied.push(unit.id.clone());
        }

        info!(batch, count = applied.len(), "applied pending migrations");
        Ok(ApplyReport {
            batch: Some(batch),
            applied,
        })
    }

    /// Rolls back the most recent batch in reverse-application order.
    ///
    /// An empty ledger is a successful no-op, not an error. On failure the
    /// sequence stops: units already unrecorded in this invocation stay
    /// rolled back, so `down` is safely resumable.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] if an applied record has no
    /// catalog unit to supply the reverse statements, or
    /// [`MigrateError::RevertFailed`] naming the failing unit.
    pub fn down(&mut self) -> Result<RollbackReport> {
        self.ledger.ensure(&self.conn)?;
        let batch = self.ledger.current_batch(&self.conn)?;
        let ids = self.ledger.last_batch_ids(&self.conn)?;

        if ids.is_empty() {
            info!("nothing to roll back");
            return Ok(RollbackReport {
                batch: None,
                rolled_back: Vec::new(),
            });
        }

        let mut rolled_back = Vec::with_capacity(ids.len());
        for id in &ids {
            let unit = self
                .catalog
                .get(id)
                .cloned()
                .ok_or_else(|| MigrateError::NotFound { id: id.clone() })?;
            if let Err(err) = self.revert_unit(&unit) {
                return Err(MigrateError::RevertFailed {
                    id: unit.id.clone(),
                    reverted_before: rolled_back.len(),
                    source: Box::new(err),
                });
            }
            rolled_back.push(unit.id.clone());
        }

        info!(count = rolled_back.len(), "rolled back last batch");
        Ok(RollbackReport {
            batch,
            rolled_back,
        })
    }

    /// Runs exactly one unit, bypassing batch bookkeeping.
    ///
    /// An explicit `Up` of an already-applied unit is a no-op (applying
    /// twice is never an error); an explicit `Up` of a pending unit is
    /// recorded under a fresh batch. An explicit `Down` removes only the
    /// named unit's record.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotFound`] if `id` is absent from the
    /// catalog, or [`MigrateError::NotApplied`] for a `Down` with no
    /// applied record.
    pub fn run(&mut self, id: &MigrationId, direction: Direction) -> Result<RunOutcome> {
        self.ledger.ensure(&self.conn)?;
        let unit = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| MigrateError::NotFound { id: id.clone() })?;
        let applied = self.ledger.applied_ids(&self.conn)?;

        match direction {
            Direction::Up => {
                if applied.contains(id) {
                    return Ok(RunOutcome::AlreadyApplied);
                }
                let batch = self.ledger.next_batch(&self.conn)?;
                self.apply_unit(&unit, batch)?;
                Ok(RunOutcome::Applied { batch })
            }
            Direction::Down => {
                if !applied.contains(id) {
                    return Err(MigrateError::NotApplied { id: id.clone() });
                }
                self.revert_unit(&unit)?;
                Ok(RunOutcome::Reverted)
            }
        }
    }

    /// Reports the state of every catalog unit. Pure read; see
    /// [`status::status`].
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        status::status(&self.conn, &self.catalog, &self.ledger)
    }

    /// Executes one unit's forward statements and records it, in a single
    /// transaction.
    fn apply_unit(&mut self, unit: &MigrationUnit, batch: i64) -> Result<()> {
        debug!(id = %unit.id, batch, "applying migration");
        let tx = self.conn.transaction()?;
        tx.execute_batch(&unit.forward)?;
        self.ledger.record_applied(&tx, &unit.id, batch)?;
        tx.commit()?;
        Ok(())
    }

    /// Executes one unit's reverse statements and removes its record, in a
    /// single transaction.
    fn revert_unit(&mut self, unit: &MigrationUnit) -> Result<()> {
        debug!(id = %unit.id, "rolling back migration");
        let tx = self.conn.transaction()?;
        tx.execute_batch(&unit.reverse)?;
        self.ledger.unrecord(&tx, &unit.id)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_migrate_core::MigrationState;

    fn unit(id: &str, forward: &str, reverse: &str) -> MigrationUnit {
        MigrationUnit::new(id.parse().unwrap(), forward, reverse)
    }

    fn users_and_email() -> Vec<MigrationUnit> {
        vec![
            unit(
                "m_20250101000000_create_users",
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
                "DROP TABLE users;",
            ),
            unit(
                "m_20250102000000_add_email",
                "ALTER TABLE users ADD COLUMN email TEXT;",
                "ALTER TABLE users DROP COLUMN email;",
            ),
        ]
    }

    fn runner_with(units: Vec<MigrationUnit>) -> MigrationRunner {
        let conn = Connection::open_in_memory().unwrap();
        let catalog = MigrationCatalog::from_units(units).unwrap();
        let ledger = Ledger::new("schema_migrations").unwrap();
        MigrationRunner::new(conn, catalog, ledger)
    }

    fn table_exists(runner: &MigrationRunner, name: &str) -> bool {
        runner
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get::<_, i64>(0),
            )
            .unwrap()
            > 0
    }

    #[test]
    fn test_up_applies_all_pending_in_one_batch() {
        let mut runner = runner_with(users_and_email());
        let report = runner.up().unwrap();

        assert_eq!(report.batch, Some(1));
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.applied[0].as_str(), "m_20250101000000_create_users");
        assert!(table_exists(&runner, "users"));
    }

    #[test]
    fn test_up_twice_is_noop() {
        let mut runner = runner_with(users_and_email());
        runner.up().unwrap();
        let second = runner.up().unwrap();

        assert_eq!(second.batch, None);
        assert!(second.applied.is_empty());
    }

    #[test]
    fn test_down_rolls_back_last_batch_only() {
        let mut runner = runner_with(vec![users_and_email()[0].clone()]);
        runner.up().unwrap();

        // Second batch with the email unit
        let extra = users_and_email()[1].clone();
        let conn = runner.into_connection();
        let mut runner = MigrationRunner::new(
            conn,
            MigrationCatalog::from_units(users_and_email()).unwrap(),
            Ledger::new("schema_migrations").unwrap(),
        );
        runner.up().unwrap();

        let report = runner.down().unwrap();
        assert_eq!(report.batch, Some(2));
        assert_eq!(report.rolled_back, vec![extra.id]);

        // users stays applied, email pending again
        let entries = runner.status().unwrap();
        assert_eq!(entries[0].state, MigrationState::Applied { batch: 1 });
        assert_eq!(entries[1].state, MigrationState::Pending);
    }

    #[test]
    fn test_down_empty_ledger_is_noop() {
        let mut runner = runner_with(users_and_email());
        let report = runner.down().unwrap();
        assert_eq!(report.batch, None);
        assert!(report.rolled_back.is_empty());
    }

    #[test]
    fn test_up_down_up_roundtrip() {
        let mut runner = runner_with(users_and_email());
        let first = runner.up().unwrap();
        runner.down().unwrap();
        let second = runner.up().unwrap();

        assert_eq!(first.applied, second.applied);
        assert_eq!(second.batch, Some(2));
        assert!(table_exists(&runner, "users"));
    }

    #[test]
    fn test_failing_unit_preserves_earlier_progress() {
        let mut units = users_and_email();
        units[1].forward = "ALTER TABLE nonexistent ADD COLUMN email TEXT;".to_string();
        let mut runner = runner_with(units);

        let err = runner.up().unwrap_err();
        match err {
            MigrateError::UnitFailed {
                id, applied_before, ..
            } => {
                assert_eq!(id.as_str(), "m_20250102000000_add_email");
                assert_eq!(applied_before, 1);
            }
            other => panic!("expected UnitFailed, got {other}"),
        }

        // First unit committed, failing unit left pending
        let entries = runner.status().unwrap();
        assert_eq!(entries[0].state, MigrationState::Applied { batch: 1 });
        assert_eq!(entries[1].state, MigrationState::Pending);
    }

    #[test]
    fn test_resume_after_failure_applies_only_suffix() {
        let mut broken = users_and_email();
        broken[1].forward = "ALTER TABLE nonexistent ADD COLUMN email TEXT;".to_string();
        let mut runner = runner_with(broken);
        runner.up().unwrap_err();

        // Fix the unit and re-invoke against the same database
        let conn = runner.into_connection();
        let mut runner = MigrationRunner::new(
            conn,
            MigrationCatalog::from_units(users_and_email()).unwrap(),
            Ledger::new("schema_migrations").unwrap(),
        );
        let report = runner.up().unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].as_str(), "m_20250102000000_add_email");
    }

    #[test]
    fn test_failed_unit_transaction_rolls_back_ledger() {
        // Forward body mutates schema then fails: neither the mutation nor
        // the ledger row may survive
        let units = vec![unit(
            "m_20250101000000_two_steps",
            "CREATE TABLE half_done (id INTEGER); INVALID SQL;",
            "DROP TABLE half_done;",
        )];
        let mut runner = runner_with(units);
        runner.up().unwrap_err();

        assert!(!table_exists(&runner, "half_done"));
        let entries = runner.status().unwrap();
        assert_eq!(entries[0].state, MigrationState::Pending);
    }

    #[test]
    fn test_run_explicit_up_and_down() {
        let mut runner = runner_with(users_and_email());
        let id: MigrationId = "m_20250101000000_create_users".parse().unwrap();

        let outcome = runner.run(&id, Direction::Up).unwrap();
        assert_eq!(outcome, RunOutcome::Applied { batch: 1 });
        assert!(table_exists(&runner, "users"));

        // Explicit up of an applied unit is a no-op
        let outcome = runner.run(&id, Direction::Up).unwrap();
        assert_eq!(outcome, RunOutcome::AlreadyApplied);

        let outcome = runner.run(&id, Direction::Down).unwrap();
        assert_eq!(outcome, RunOutcome::Reverted);
        assert!(!table_exists(&runner, "users"));
    }

    #[test]
    fn test_run_unknown_id_is_not_found() {
        let mut runner = runner_with(users_and_email());
        let ghost: MigrationId = "m_20990101000000_ghost".parse().unwrap();
        let err = runner.run(&ghost, Direction::Up).unwrap_err();
        assert!(matches!(err, MigrateError::NotFound { .. }));
    }

    #[test]
    fn test_run_down_without_record_is_not_applied() {
        let mut runner = runner_with(users_and_email());
        let id: MigrationId = "m_20250101000000_create_users".parse().unwrap();
        let err = runner.run(&id, Direction::Down).unwrap_err();
        assert!(matches!(err, MigrateError::NotApplied { .. }));
    }

    #[test]
    fn test_run_explicit_up_allocates_fresh_batch() {
        let mut runner = runner_with(users_and_email());
        runner.up().unwrap();
        runner.down().unwrap(); // email back to pending, batch 1 remains

        let id: MigrationId = "m_20250102000000_add_email".parse().unwrap();
        let outcome = runner.run(&id, Direction::Up).unwrap();
        assert_eq!(outcome, RunOutcome::Applied { batch: 2 });
    }

    #[test]
    fn test_down_with_missing_catalog_unit_fails() {
        let mut runner = runner_with(users_and_email());
        runner.up().unwrap();

        // Rebuild the runner with an empty catalog: applied records now have
        // no reverse statements available
        let conn = runner.into_connection();
        let mut runner = MigrationRunner::new(
            conn,
            MigrationCatalog::from_units(Vec::new()).unwrap(),
            Ledger::new("schema_migrations").unwrap(),
        );
        let err = runner.down().unwrap_err();
        assert!(matches!(err, MigrateError::NotFound { .. }));
    }
}
