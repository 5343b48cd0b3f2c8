//! Error types for ledger and runner operations.
//!
//! The runner never swallows a mid-sequence failure: it stops, preserves
//! the units already committed in the invocation, and reports exactly which
//! unit failed and how much progress preceded it. Nothing is retried
//! automatically.

use schema_migrate_catalog::DiscoveryError;
use schema_migrate_core::MigrationId;
use thiserror::Error;

/// Errors that can occur while mutating the target schema or the ledger.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Connection or statement execution failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Catalog load or configuration failure.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Ledger uniqueness violation: a concurrent invocation applied the
    /// same unit first.
    #[error("migration '{id}' was applied concurrently by another invocation")]
    Conflict {
        /// Unit that lost the race.
        id: MigrationId,
    },

    /// The requested unit is not in the catalog.
    #[error("migration '{id}' not found in the catalog")]
    NotFound {
        /// Unknown id.
        id: MigrationId,
    },

    /// Explicit reverse run requested for a unit with no applied record.
    #[error("migration '{id}' is not applied")]
    NotApplied {
        /// Unit with no ledger record.
        id: MigrationId,
    },

    /// A unit's forward run failed mid-sequence. Units applied earlier in
    /// the same invocation keep their committed state.
    #[error("migration '{id}' failed after {applied_before} unit(s) were applied: {source}")]
    UnitFailed {
        /// Unit whose forward statements failed.
        id: MigrationId,
        /// Units successfully applied earlier in the same invocation.
        applied_before: usize,
        /// Underlying failure.
        #[source]
        source: Box<MigrateError>,
    },

    /// A unit's reverse run failed mid-rollback. Units already unrecorded
    /// in the same invocation stay rolled back.
    #[error("rollback of '{id}' failed after {reverted_before} unit(s) were rolled back: {source}")]
    RevertFailed {
        /// Unit whose reverse statements failed.
        id: MigrationId,
        /// Units successfully rolled back earlier in the same invocation.
        reverted_before: usize,
        /// Underlying failure.
        #[source]
        source: Box<MigrateError>,
    },

    /// Ledger table name contains invalid characters.
    #[error("invalid ledger table name '{0}': must contain only alphanumeric characters and underscores")]
    InvalidTableName(String),

    /// A ledger row could not be interpreted (hand-edited or corrupt).
    #[error("ledger error: {0}")]
    Ledger(String),
}

/// Convenience alias for results with [`MigrateError`].
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Maps a ledger insert failure to [`MigrateError::Conflict`] when it is a
/// uniqueness violation, preserving other database errors as-is.
pub(crate) fn conflict_on_unique(id: &MigrationId, err: rusqlite::Error) -> MigrateError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            MigrateError::Conflict { id: id.clone() }
        }
        _ => MigrateError::Database(err),
    }
}
