//! SQLite execution engine for versioned schema migrations.
//!
//! This crate owns every mutation of the target schema and of the ledger
//! that tracks applied migrations. It provides the applied-state store, the
//! batch runner, and the read-only status reporter.
//!
//! # Architecture
//!
//! - **`ledger`**: persistent applied-state store (dedicated table, created
//!   lazily, uniqueness-constrained on migration id)
//! - **`runner`**: batch apply (`up`), batch rollback (`down`), explicit
//!   single-unit runs
//! - **`status`**: pure-read reporting of pending/applied state
//!
//! # Execution discipline
//!
//! Each unit's SQL and its ledger write share one transaction: a unit is
//! either fully applied and recorded, or neither. A failure mid-sequence
//! stops the run and preserves the units already committed, so `up` and
//! `down` are both safe to re-invoke after fixing the cause.
//!
//! # Quick start
//!
//! ```no_run
//! use schema_migrate_catalog::MigratorConfig;
//! use schema_migrate_sqlite::MigrationRunner;
//!
//! let config = MigratorConfig::default();
//! let mut runner = MigrationRunner::from_config(&config).unwrap();
//!
//! let report = runner.up().unwrap();
//! if let Some(batch) = report.batch {
//!     println!("applied {} unit(s) in batch {batch}", report.applied.len());
//! }
//!
//! for entry in runner.status().unwrap() {
//!     println!("{}: {:?}", entry.id, entry.state);
//! }
//! ```

mod error;
mod ledger;
mod runner;
mod status;

pub use error::{MigrateError, Result};
pub use ledger::Ledger;
pub use runner::{ApplyReport, MigrationRunner, RollbackReport, RunOutcome};
pub use status::{StatusEntry, status};
