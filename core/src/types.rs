//! Data model for migration units and applied-state records.
//!
//! The types here are consumed read-only by the catalog and runner: a
//! [`MigrationUnit`] is never mutated after creation, only superseded by a
//! newer unit. All types serialize with [`serde`] for status output.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::{self, IdError};

/// Format string for the timestamp portion of a [`MigrationId`].
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Prefix shared by every migration id.
pub(crate) const ID_PREFIX: &str = "m_";

/// Stable identifier of a migration unit: `m_<YYYYMMDDHHMMSS>_<slug>`.
///
/// Immutable once created. The derived `Ord` compares the underlying string,
/// which equals chronological order thanks to the fixed-width timestamp
/// prefix.
///
/// # Examples
///
/// ```
/// use schema_migrate_core::MigrationId;
///
/// let a: MigrationId = "m_20250101120000_create_users".parse().unwrap();
/// let b: MigrationId = "m_20250102090000_add_email".parse().unwrap();
/// assert!(a < b);
///
/// // Malformed ids are rejected
/// assert!("20250101_create_users".parse::<MigrationId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationId(String);

impl MigrationId {
    /// Builds an id from a timestamp and an already-validated slug.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if the slug is empty or contains characters other
    /// than lowercase ASCII alphanumerics and underscores.
    pub fn generate(timestamp: DateTime<Utc>, slug: &str) -> Result<Self, IdError> {
        validate::validate_slug(slug)?;
        Ok(Self(format!(
            "{ID_PREFIX}{}_{slug}",
            timestamp.format(TIMESTAMP_FORMAT)
        )))
    }

    /// Returns the full id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 14-digit timestamp portion.
    pub fn timestamp(&self) -> &str {
        &self.0[ID_PREFIX.len()..ID_PREFIX.len() + 14]
    }

    /// Returns the slug portion after the timestamp.
    pub fn slug(&self) -> &str {
        &self.0[ID_PREFIX.len() + 15..]
    }
}

impl FromStr for MigrationId {
    type Err = IdError;

    fn from_str(raw: &str) -> Result<Self, IdError> {
        validate::validate_id(raw)?;
        Ok(Self(raw.to_string()))
    }
}

// Deserialization funnels through the same validation as parsing, so the
// slicing in `timestamp()`/`slug()` cannot see a malformed id.
impl TryFrom<String> for MigrationId {
    type Error = IdError;

    fn try_from(raw: String) -> Result<Self, IdError> {
        validate::validate_id(&raw)?;
        Ok(Self(raw))
    }
}

impl From<MigrationId> for String {
    fn from(id: MigrationId) -> String {
        id.0
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, ordered schema change with a forward and a reverse operation.
///
/// `forward` and `reverse` hold one or more SQL statements that are passed
/// through to the target database verbatim; `reverse` undoes `forward` at
/// the schema level (not necessarily data-preserving).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationUnit {
    /// Stable identifier, unique across the catalog.
    pub id: MigrationId,
    /// SQL moving the schema forward.
    pub forward: String,
    /// SQL undoing `forward`'s effect.
    pub reverse: String,
}

impl MigrationUnit {
    /// Creates a unit from its id and SQL bodies.
    pub fn new(id: MigrationId, forward: impl Into<String>, reverse: impl Into<String>) -> Self {
        Self {
            id,
            forward: forward.into(),
            reverse: reverse.into(),
        }
    }
}

/// Direction of an explicit single-unit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Execute the forward operation.
    Up,
    /// Execute the reverse operation.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Where a migration unit stands relative to the ledger.
///
/// Units move Pending → Applied on a successful forward run and back to
/// Pending on a successful reverse run; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    /// Discovered in the catalog, no ledger record.
    Pending,
    /// Recorded in the ledger under the given batch.
    Applied {
        /// Batch the unit was applied in.
        batch: i64,
    },
}

/// One row of the ledger: a migration unit that has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    /// Id of the applied unit.
    pub migration_id: MigrationId,
    /// Batch shared by all units applied in the same `up` invocation.
    pub batch: i64,
    /// When the unit was applied.
    pub applied_at: DateTime<Utc>,
}
