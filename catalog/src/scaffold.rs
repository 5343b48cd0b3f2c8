//! Scaffolding for new migration file pairs.
//!
//! The id timestamp has one-second granularity, so two units created within
//! the same second would collide. The scaffold bumps the timestamp forward
//! until the id is free; the catalog loader independently rejects any
//! collision that slips through.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use schema_migrate_core::{MigrationId, sanitize_slug};
use tracing::debug;

use crate::error::Result;

/// Paths and id of a freshly scaffolded migration unit.
#[derive(Debug, Clone)]
pub struct CreatedMigration {
    /// Id derived from the creation timestamp and the sanitized name.
    pub id: MigrationId,
    /// Path of the forward SQL file.
    pub up_path: PathBuf,
    /// Path of the reverse SQL file.
    pub down_path: PathBuf,
}

/// Creates a new migration pair in `dir`, named after the current time.
///
/// See [`create_migration_at`] for details.
pub fn create_migration(dir: impl AsRef<Path>, name: &str) -> Result<CreatedMigration> {
    create_migration_at(dir, name, Utc::now())
}

/// Creates a new migration pair in `dir` with an id derived from `now`.
///
/// `name` is sanitized into a slug. The directory is created if absent. If a
/// unit already occupies the timestamp, the timestamp is bumped by one
/// second until the id is free.
///
/// # Errors
///
/// Returns [`Io`](crate::DiscoveryError::Io) if the directory or files
/// cannot be created.
pub fn create_migration_at(
    dir: impl AsRef<Path>,
    name: &str,
    now: DateTime<Utc>,
) -> Result<CreatedMigration> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let slug = sanitize_slug(name);
    let mut timestamp = now;
    let (id, up_path, down_path) = loop {
        let id = MigrationId::generate(timestamp, &slug).map_err(|source| {
            crate::DiscoveryError::InvalidId {
                file: name.to_string(),
                source,
            }
        })?;
        let up_path = dir.join(format!("{id}.up.sql"));
        let down_path = dir.join(format!("{id}.down.sql"));
        if !up_path.exists() && !down_path.exists() {
            break (id, up_path, down_path);
        }
        timestamp += Duration::seconds(1);
    };

    fs::write(&up_path, format!("-- {id}: forward statements\n"))?;
    fs::write(&down_path, format!("-- {id}: reverse statements\n"))?;
    debug!(id = %id, "scaffolded migration pair");

    Ok(CreatedMigration {
        id,
        up_path,
        down_path,
    })
}
