//! gradesync CLI
//!
//! Local entry point: one-shot sync, periodic watch, and snapshot inspection.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gradesync::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, SyncEngine},
    storage::{LocalSnapshotStore, SnapshotStore},
};

/// gradesync - Moodle grade change tracker
#[derive(Parser, Debug)]
#[command(
    name = "gradesync",
    version,
    about = "Detects new and changed grades on a Moodle site"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one synchronization and print changes as JSON lines
    Sync,

    /// Synchronize periodically until Ctrl-C
    Watch {
        /// Override `sync.interval_secs`
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List courses with a stored snapshot
    List,

    /// Print the stored snapshot of one course
    Show {
        /// Course name as printed by `list`
        course: String,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn snapshot_store(config: &Config) -> Result<LocalSnapshotStore> {
    Ok(LocalSnapshotStore::with_delimiter(
        &config.storage.dir,
        config.storage.delimiter_byte()?,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Inspection commands only need the storage settings.
    let config = match cli.command {
        Command::List | Command::Show { .. } => Config::load_or_default(&cli.config),
        _ => Config::load(&cli.config)?,
    }
    .apply_env();
    log::debug!("Using configuration {}", cli.config.display());

    match cli.command {
        Command::Sync => {
            config.validate()?;
            let engine = SyncEngine::from_config(&config)?;

            let changes = engine.sync().await?;
            for change in &changes {
                println!("{}", serde_json::to_string(change)?);
            }
            log::info!("{} changes", changes.len());
        }

        Command::Watch { interval } => {
            config.validate()?;
            let interval = Duration::from_secs(interval.unwrap_or(config.sync.interval_secs));
            if interval.is_zero() {
                return Err(AppError::validation("interval must be > 0"));
            }
            let engine = SyncEngine::from_config(&config)?;

            log::info!("Watching every {}s, Ctrl-C to stop", interval.as_secs());
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            pipeline::run_periodic(&engine, interval, shutdown).await;
            engine.wait_until_idle().await;
        }

        Command::List => {
            for entity in snapshot_store(&config)?.list().await? {
                println!("{}", entity);
            }
        }

        Command::Show { course } => {
            let rows = snapshot_store(&config)?.get(&course).await?;
            for row in &rows {
                println!(
                    "{:<40} {:>10} {:>12}",
                    row.name,
                    row.score_with_slash(),
                    row.percentage
                );
                if let Some(feedback) = &row.feedback {
                    println!("    {}", feedback);
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK");
        }
    }

    Ok(())
}
