//! Migration discovery and configuration.
//!
//! This crate finds migration units on disk, orders them deterministically,
//! and computes the pending set against the applied-state ledger. It also
//! owns the resolved configuration value passed into each component and the
//! scaffold that creates new migration file pairs.
//!
//! # Discovery convention
//!
//! A migration unit is a pair of files in the migrations directory:
//!
//! ```text
//! migrations/
//!   m_20250101120000_create_users.up.sql
//!   m_20250101120000_create_users.down.sql
//! ```
//!
//! The shared stem is the unit's id. A unit missing either half, or any
//! `.sql` file that does not follow the convention, is a discovery error;
//! never silently skipped.
//!
//! # Quick start
//!
//! ```no_run
//! use schema_migrate_catalog::MigrationCatalog;
//! use std::collections::HashSet;
//!
//! let catalog = MigrationCatalog::load("migrations/").unwrap();
//! let pending = catalog.pending(&HashSet::new());
//! println!("{} unit(s) pending", pending.len());
//! ```

mod catalog;
mod config;
mod error;
mod scaffold;

pub use catalog::MigrationCatalog;
pub use config::{CONFIG_TEMPLATE, DEFAULT_CONFIG_FILE, MigratorConfig};
pub use error::{DiscoveryError, Result};
pub use scaffold::{CreatedMigration, create_migration, create_migration_at};
