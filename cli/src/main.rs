use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use schema_migrate_catalog::{
    CONFIG_TEMPLATE, DEFAULT_CONFIG_FILE, MigratorConfig, create_migration,
};
use schema_migrate_core::{Direction, MigrationId, MigrationState};
use schema_migrate_sqlite::{MigrationRunner, RunOutcome};

/// CLI-specific direction enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliDirection {
    Up,
    Down,
}

impl From<CliDirection> for Direction {
    fn from(direction: CliDirection) -> Self {
        match direction {
            CliDirection::Up => Self::Up,
            CliDirection::Down => Self::Down,
        }
    }
}

/// Output format for the status command.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "schema-migrate")]
#[command(about = "Versioned SQL schema migrations with batch rollback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply all pending migrations in one batch.
    Up(UpArgs),
    /// Roll back the most recent batch.
    Down(DownArgs),
    /// Show the state of every migration.
    Status(StatusArgs),
    /// Run a single migration explicitly, bypassing batch bookkeeping.
    Run(RunArgs),
    /// Create a new migration file pair.
    Create(CreateArgs),
    /// Write a default configuration file.
    Init(InitArgs),
}

/// Configuration source and overrides shared by database-touching commands.
#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to the configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Database file path (overrides the configuration file).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Migrations directory (overrides the configuration file).
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Ledger table name (overrides the configuration file).
    #[arg(long)]
    table: Option<String>,
}

impl ConfigArgs {
    /// Loads the configuration file when present, falls back to defaults
    /// otherwise, then applies flag overrides.
    fn resolve(&self) -> Result<MigratorConfig, String> {
        let mut config = if self.config.exists() {
            MigratorConfig::load(&self.config).map_err(|e| {
                format!("Failed to load config '{}': {e}", self.config.display())
            })?
        } else {
            MigratorConfig::default()
        };
        if let Some(db) = &self.db {
            config.database = db.clone();
        }
        if let Some(dir) = &self.dir {
            config.migrations_dir = dir.clone();
        }
        if let Some(table) = &self.table {
            config.ledger_table = table.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
struct UpArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct DownArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Migration id (e.g. m_20250101120000_create_users).
    id: String,
    /// Direction to run the migration in.
    #[arg(value_enum)]
    direction: CliDirection,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct CreateArgs {
    /// Migration name; sanitized into the id slug.
    name: String,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Where to write the configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    path: PathBuf,
    /// Overwrite an existing configuration file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Up(args) => run_up(args),
        Command::Down(args) => run_down(args),
        Command::Status(args) => run_status(args),
        Command::Run(args) => run_single(args),
        Command::Create(args) => run_create(args),
        Command::Init(args) => run_init(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_up(args: UpArgs) -> Result<(), String> {
    let config = args.config.resolve()?;
    let mut runner = MigrationRunner::from_config(&config).map_err(|e| e.to_string())?;
    let report = runner.up().map_err(|e| e.to_string())?;

    match report.batch {
        Some(batch) => {
            for id in &report.applied {
                println!("Applied {id}");
            }
            println!("Applied {} migration(s) in batch {batch}.", report.applied.len());
        }
        None => println!("Nothing to apply; all migrations are up to date."),
    }
    Ok(())
}

fn run_down(args: DownArgs) -> Result<(), String> {
    let config = args.config.resolve()?;
    let mut runner = MigrationRunner::from_config(&config).map_err(|e| e.to_string())?;
    let report = runner.down().map_err(|e| e.to_string())?;

    match report.batch {
        Some(batch) => {
            for id in &report.rolled_back {
                println!("Rolled back {id}");
            }
            println!(
                "Rolled back {} migration(s) from batch {batch}.",
                report.rolled_back.len()
            );
        }
        None => println!("Nothing to roll back."),
    }
    Ok(())
}

fn run_status(args: StatusArgs) -> Result<(), String> {
    let config = args.config.resolve()?;
    let runner = MigrationRunner::from_config_read_only(&config).map_err(|e| e.to_string())?;
    let entries = runner.status().map_err(|e| e.to_string())?;

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&entries)
                .map_err(|e| format!("Failed to serialize status: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Table => {
            println!("Migration status ({}):", config.database.display());
            if entries.is_empty() {
                println!("  (no migrations discovered)");
            }
            for entry in &entries {
                match entry.state {
                    MigrationState::Applied { batch } => {
                        println!("  {}  applied  (batch {batch})", entry.id);
                    }
                    MigrationState::Pending => {
                        println!("  {}  pending", entry.id);
                    }
                }
            }
        }
    }
    Ok(())
}

fn run_single(args: RunArgs) -> Result<(), String> {
    let id: MigrationId = args
        .id
        .parse()
        .map_err(|e| format!("Invalid migration id '{}': {e}", args.id))?;
    let config = args.config.resolve()?;
    let mut runner = MigrationRunner::from_config(&config).map_err(|e| e.to_string())?;

    match runner.run(&id, args.direction.into()).map_err(|e| e.to_string())? {
        RunOutcome::Applied { batch } => println!("Applied {id} in batch {batch}."),
        RunOutcome::AlreadyApplied => println!("{id} is already applied; nothing to do."),
        RunOutcome::Reverted => println!("Rolled back {id}."),
    }
    Ok(())
}

fn run_create(args: CreateArgs) -> Result<(), String> {
    let config = args.config.resolve()?;
    let created = create_migration(&config.migrations_dir, &args.name)
        .map_err(|e| format!("Failed to create migration: {e}"))?;

    println!("Created migration {}:", created.id);
    println!("  {}", created.up_path.display());
    println!("  {}", created.down_path.display());
    Ok(())
}

fn run_init(args: InitArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "'{}' already exists; pass --force to overwrite",
            args.path.display()
        ));
    }
    fs::write(&args.path, CONFIG_TEMPLATE)
        .map_err(|e| format!("Failed to write '{}': {e}", args.path.display()))?;
    println!("Wrote configuration to '{}'.", args.path.display());
    Ok(())
}
