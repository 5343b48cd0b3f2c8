//! Discovery and ordering of migration units.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use schema_migrate_core::{MigrationId, MigrationUnit};
use tracing::debug;

use crate::error::{DiscoveryError, Result};

/// File-pair accumulator used during directory discovery.
#[derive(Debug, Default)]
struct UnitFiles {
    up: Option<PathBuf>,
    down: Option<PathBuf>,
}

/// Ordered collection of the migration units available to the runner.
///
/// Units are sorted ascending by id, which the id format guarantees is
/// chronological order regardless of filesystem enumeration order. The
/// catalog is read-only after construction.
///
/// # Examples
///
/// ```no_run
/// use schema_migrate_catalog::MigrationCatalog;
/// use std::collections::HashSet;
///
/// let catalog = MigrationCatalog::load("migrations/").unwrap();
/// for unit in catalog.list_all() {
///     println!("{}", unit.id);
/// }
/// let pending = catalog.pending(&HashSet::new());
/// assert_eq!(pending.len(), catalog.len());
/// ```
#[derive(Debug)]
pub struct MigrationCatalog {
    units: Vec<MigrationUnit>,
}

impl MigrationCatalog {
    /// Discovers units from a directory of `<id>.up.sql` / `<id>.down.sql`
    /// pairs.
    ///
    /// Non-`.sql` files are ignored; `.sql` files that do not follow the
    /// convention, half-defined pairs, and duplicate ids are all surfaced as
    /// errors rather than skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Io`] if the directory is unreadable,
    /// [`DiscoveryError::InvalidId`] or [`DiscoveryError::UnexpectedFile`]
    /// for malformed file names, [`DiscoveryError::MissingForward`] /
    /// [`DiscoveryError::MissingReverse`] for half-defined units, and
    /// [`DiscoveryError::DuplicateId`] when two files claim the same role
    /// for one id.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: BTreeMap<MigrationId, UnitFiles> = BTreeMap::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                return Err(DiscoveryError::UnexpectedFile(path));
            };

            let (id_str, is_up) = if let Some(base) = stem.strip_suffix(".up") {
                (base, true)
            } else if let Some(base) = stem.strip_suffix(".down") {
                (base, false)
            } else {
                return Err(DiscoveryError::UnexpectedFile(path));
            };

            let id: MigrationId = id_str.parse().map_err(|source| DiscoveryError::InvalidId {
                file: path.display().to_string(),
                source,
            })?;

            let slot = files.entry(id.clone()).or_default();
            let role = if is_up { &mut slot.up } else { &mut slot.down };
            if role.replace(path).is_some() {
                return Err(DiscoveryError::DuplicateId { id });
            }
        }

        let mut units = Vec::with_capacity(files.len());
        for (id, pair) in files {
            let up = pair
                .up
                .ok_or_else(|| DiscoveryError::MissingForward { id: id.clone() })?;
            let down = pair
                .down
                .ok_or_else(|| DiscoveryError::MissingReverse { id: id.clone() })?;
            let forward = fs::read_to_string(&up)?;
            let reverse = fs::read_to_string(&down)?;
            units.push(MigrationUnit::new(id, forward, reverse));
        }

        debug!(dir = %dir.display(), count = units.len(), "discovered migration units");
        Ok(Self { units })
    }

    /// Builds a catalog from explicitly registered units.
    ///
    /// Units are sorted by id; a duplicate id is rejected the same way the
    /// directory loader rejects it.
    pub fn from_units(mut units: Vec<MigrationUnit>) -> Result<Self> {
        units.sort_by(|a, b| a.id.cmp(&b.id));
        for pair in units.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(DiscoveryError::DuplicateId {
                    id: pair[0].id.clone(),
                });
            }
        }
        Ok(Self { units })
    }

    /// Returns all units, sorted ascending by id.
    pub fn list_all(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// Returns the units whose id is not in `applied`, preserving
    /// chronological order.
    pub fn pending(&self, applied: &HashSet<MigrationId>) -> Vec<&MigrationUnit> {
        self.units
            .iter()
            .filter(|unit| !applied.contains(&unit.id))
            .collect()
    }

    /// Looks up a unit by id.
    pub fn get(&self, id: &MigrationId) -> Option<&MigrationUnit> {
        self.units.iter().find(|unit| &unit.id == id)
    }

    /// Returns `true` if the catalog contains a unit with `id`.
    pub fn contains(&self, id: &MigrationId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the catalog contains no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
