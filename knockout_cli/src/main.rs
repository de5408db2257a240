//! Operator command line for knockout brackets.
//!
//! Drives the bracket engine against a PostgreSQL database and prints each
//! result as JSON on stdout.

mod commands;
mod config;
mod logging;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Error};
use commands::Command;
use config::CliConfig;
use knockout::{BracketEngine, PgBracketStore, db::Database};
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Manage knockout brackets stored in PostgreSQL

USAGE:
  knockout_cli [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
  migrate                                     Apply database migrations
  build     --category ID --layout FILE       Build a bracket from a JSON layout
  generate  --category ID [--apply]           Single-elimination layout from enrollments
  winner    --match ID --participant ID       Record a winner and advance
  render    --category ID                     Print the bracket grouped by round
  seed      --participant ID --category ID --seed N
                                              Assign a seed (enrolls if needed)
  add-match --category ID --participants ID,ID [--round N] [--number N]
                                              Add a match to a flat list

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  DB_MAX_CONNECTIONS       Maximum pool size (default: 20)
  RUST_LOG                 Log filter (default: KNOCKOUT_LOG or info,sqlx=warn)
  (A .env file in the working directory is loaded first)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let command = Command::parse(pargs)?;

    let config = CliConfig::from_env(database_url)?;
    config.validate()?;
    logging::init(&config.log_filter);

    let name = command.name();
    let started = Instant::now();
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    let output = if command == Command::Migrate {
        db.migrate().await.context("Failed to apply migrations")?;
        info!("Migrations applied");
        serde_json::json!({ "migrated": true })
    } else {
        let store = PgBracketStore::new(Arc::new(db.pool().clone()));
        let engine = BracketEngine::new(Arc::new(store));
        command
            .execute(&engine)
            .await
            .with_context(|| format!("{name} failed"))?
    };

    logging::log_command(name, started.elapsed());
    println!("{}", serde_json::to_string_pretty(&output)?);

    db.close().await;
    Ok(())
}
