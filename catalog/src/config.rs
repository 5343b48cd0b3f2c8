//! Resolved configuration for migration runs.
//!
//! The configuration is an explicit value handed into each component's
//! constructor; there is no process-wide state. Loading precedence (which
//! file, which flag overrides) is the CLI's concern; this module only
//! defines the shape and the YAML load/save plumbing.
//!
//! # Example YAML
//!
//! ```yaml
//! database: schema.db
//! migrations_dir: migrations
//! ledger_table: schema_migrations
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "schema-migrate.yml";

/// Commented configuration template written by `schema-migrate init`.
///
/// Parses to the same values as [`MigratorConfig::default`].
pub const CONFIG_TEMPLATE: &str = "\
# schema-migrate configuration

# Database file the migrations run against.
database: schema.db

# Directory containing <id>.up.sql / <id>.down.sql pairs.
migrations_dir: migrations

# Table tracking which migrations have been applied.
ledger_table: schema_migrations
";

/// Connection and layout settings for a migration run.
///
/// # Examples
///
/// ```no_run
/// use schema_migrate_catalog::MigratorConfig;
///
/// let config = MigratorConfig::load("schema-migrate.yml").unwrap();
/// println!("migrating {}", config.database.display());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Database file the migrations run against.
    pub database: PathBuf,
    /// Directory holding the migration unit files.
    pub migrations_dir: PathBuf,
    /// Name of the ledger table tracking applied migrations.
    pub ledger_table: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("schema.db"),
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: "schema_migrations".to_string(),
        }
    }
}

impl MigratorConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::DiscoveryError::Io) if the file cannot be read,
    /// or [`Yaml`](crate::DiscoveryError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::DiscoveryError::Io) if the file cannot be
    /// written, or [`Yaml`](crate::DiscoveryError::Yaml) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
