//! Core types for versioned SQL schema migrations.
//!
//! This crate defines the data model shared by the catalog, store, and CLI:
//! migration identifiers, migration units, applied-state records, and the
//! validation rules that keep identifiers sortable and unique.
//!
//! # Identifier format
//!
//! Every migration unit is named `m_<YYYYMMDDHHMMSS>_<slug>`. The timestamp
//! prefix makes lexicographic order equal to chronological order, so the
//! catalog can sort units by comparing id strings.
//!
//! ```
//! use schema_migrate_core::MigrationId;
//!
//! let id: MigrationId = "m_20250101120000_create_users".parse().unwrap();
//! assert_eq!(id.timestamp(), "20250101120000");
//! assert_eq!(id.slug(), "create_users");
//! ```

mod types;
mod validate;

pub use types::{AppliedRecord, Direction, MigrationId, MigrationState, MigrationUnit};
pub use validate::{IdError, sanitize_slug, validate_slug};
