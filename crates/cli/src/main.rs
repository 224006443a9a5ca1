mod commands;
mod logging;
mod migrations;

use clap::{CommandFactory, Parser, Subcommand};
use inquiry_migrator::{MigrationError, MigrationRepository, Migrator, MigratorConfig};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::migrate;

const EXAMPLES: &str = "\
Examples:
  db-migrate status
  db-migrate up
  db-migrate rollback 3
  db-migrate revert add_google_id
  db-migrate create add_user_roles
  db-migrate status --db ./db/test.db";

#[derive(Parser, Debug)]
#[command(name = "db-migrate")]
#[command(about = "Inquiry Database Migration CLI", version)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Path to the database file (default: ./db/inquiry.db or env DATABASE_URL)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Directory of SQL migration files (default: ./migrations or env MIGRATIONS_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Show migration status
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply all pending migrations
    Up,

    /// Roll back to a version (all migrations after it are rolled back)
    Rollback {
        /// Version to keep; everything above it is rolled back
        #[arg(value_parser = clap::value_parser!(i64).range(0..))]
        version: i64,
    },

    /// Roll back a single migration by name
    Revert {
        /// Migration name
        name: String,
    },

    /// Create a new migration file
    Create {
        /// Migration name, e.g. add_user_roles
        name: String,
    },
}

impl Cli {
    fn config(&self) -> anyhow::Result<MigratorConfig> {
        let mut config = MigratorConfig::from_env()?;
        if let Some(db) = &self.db {
            config = config.with_database_path(db);
        }
        if let Some(dir) = &self.migrations_dir {
            config = config.with_migrations_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are not failures
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    let Some(command) = cli.command.as_ref() else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    if let Err(e) = logging::init_logging(&logging::LoggingConfig::from_env()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(&cli, command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e
                .downcast_ref::<MigrationError>()
                .is_some_and(MigrationError::is_store_error)
            {
                eprintln!("Check that the database path is correct and writable (--db or DATABASE_URL)");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, command: &Commands) -> anyhow::Result<bool> {
    let config = cli.config()?;
    let repository = MigrationRepository::from_dir(&config.migrations_dir)
        .with_registry(migrations::registry());
    let migrator = Migrator::connect(&config, repository).await?;

    let result = match command {
        Commands::Status { json } => migrate::status(&migrator, *json).await,
        Commands::Up => migrate::up(&migrator).await,
        Commands::Rollback { version } => migrate::rollback(&migrator, *version).await,
        Commands::Revert { name } => migrate::revert(&migrator, name).await,
        Commands::Create { name } => migrate::create(&migrator, name),
    };

    migrator.close().await;
    result
}
