//! Error types for catalog and configuration operations.
//!
//! Discovery failures are fatal to the invoking command: a malformed unit
//! aborts the run instead of vanishing from the pending set.

use std::path::PathBuf;

use schema_migrate_core::{IdError, MigrationId};
use thiserror::Error;

/// Errors that can occur while loading configuration or discovering
/// migration units.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// File I/O failure (unreadable directory, unreadable unit file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse or serialization failure.
    #[error("config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A file name did not parse as a migration id.
    #[error("invalid migration id in '{file}': {source}")]
    InvalidId {
        /// Offending file name.
        file: String,
        /// Underlying format violation.
        #[source]
        source: IdError,
    },

    /// A `.sql` file does not follow the `<id>.up.sql` / `<id>.down.sql`
    /// convention.
    #[error("unexpected file in migrations directory: {}", .0.display())]
    UnexpectedFile(PathBuf),

    /// A unit has a forward file but no reverse file.
    #[error("migration '{id}' has no reverse file ({id}.down.sql)")]
    MissingReverse {
        /// Id of the half-defined unit.
        id: MigrationId,
    },

    /// A unit has a reverse file but no forward file.
    #[error("migration '{id}' has no forward file ({id}.up.sql)")]
    MissingForward {
        /// Id of the half-defined unit.
        id: MigrationId,
    },

    /// Two units share the same id.
    #[error("duplicate migration id: {id}")]
    DuplicateId {
        /// The colliding id.
        id: MigrationId,
    },
}

/// Convenience alias for results with [`DiscoveryError`].
pub type Result<T> = std::result::Result<T, DiscoveryError>;
