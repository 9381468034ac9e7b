//! pgswap: Postgres snapshots with fast, reversible restores.
//!
//! Dumps are stored under structured keys and restored by staging the data
//! in a side database that is swapped in with two renames.

// pgswap/src/main.rs
mod config;
mod copy;
mod database;
mod dump;
mod errors;
mod hooks;
mod ls;
mod restore;
mod storage;
#[cfg(test)]
mod testing;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use config::options::OptionArgs;
use config::{DEFAULT_SETTINGS_FILE, Settings};
use errors::AppError;
use ls::ListView;

#[derive(Parser)]
#[command(name = "pgswap", version, about = "Dump and restore Postgres databases with reversible swaps")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to $PGSWAP_CONFIG, then pgswap.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a database to storage
    Dump {
        /// Skip the data of this table (repeatable)
        #[arg(short, long = "exclude", value_name = "TABLE")]
        exclude: Vec<String>,
        /// Run this hook before dumping (repeatable)
        #[arg(long = "pre-dump-hook", value_name = "NAME")]
        pre_dump_hooks: Vec<String>,
        #[arg(short, long)]
        instance: Option<String>,
        #[arg(short, long)]
        database: Option<String>,
        #[arg(short, long)]
        storage_location: Option<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Restore a dump key, key prefix, or local key into a database
    Restore {
        #[arg(value_name = "DUMP_KEY_OR_PREFIX")]
        dump_key: Option<String>,
        /// Run this hook against the restored data before the swap (repeatable)
        #[arg(long = "pre-swap-hook", value_name = "NAME")]
        pre_swap_hooks: Vec<String>,
        /// Keep the replaced database so the restore can be undone
        #[arg(short, long)]
        reversible: bool,
        #[arg(short, long)]
        database: Option<String>,
        #[arg(short, long)]
        storage_location: Option<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// List dump keys
    Ls {
        #[arg(value_name = "DUMP_KEY_PREFIX")]
        prefix: Option<String>,
        /// Only list unique instance names
        #[arg(long)]
        instances: bool,
        /// Only list unique database names
        #[arg(long)]
        databases: bool,
        /// Only list unique config names
        #[arg(long)]
        configs: bool,
        /// List local database keys
        #[arg(long)]
        local: bool,
        #[arg(short, long)]
        database: Option<String>,
        #[arg(short, long)]
        storage_location: Option<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Copy a database on the server to a local key
    Copy {
        dump_key: Option<String>,
        #[arg(short, long)]
        database: Option<String>,
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run_app(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(app_error) if app_error.is_domain() => eprintln!("Error: {}", app_error),
                _ => eprintln!("❌ Error: {:?}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn settings_path(cli: &Cli) -> PathBuf {
    cli.settings
        .clone()
        .or_else(|| env::var_os("PGSWAP_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

/// Flags given without values count as not given.
fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() { None } else { Some(values) }
}

async fn run_app(cli: Cli) -> Result<()> {
    let path = settings_path(&cli);
    let settings = Settings::load(&path)?;

    match cli.command {
        Commands::Dump {
            exclude,
            pre_dump_hooks,
            instance,
            database,
            storage_location,
            config,
        } => {
            let args = OptionArgs {
                config,
                instance,
                database,
                storage_location,
                exclude: non_empty(exclude),
                pre_dump_hooks: non_empty(pre_dump_hooks),
                ..Default::default()
            };
            let dump_key = dump::run_dump_flow(&settings, args)
                .await
                .context("Dump failed")?;
            println!("{}", dump_key);
        }
        Commands::Restore {
            dump_key,
            pre_swap_hooks,
            reversible,
            database,
            storage_location,
            config,
        } => {
            let args = OptionArgs {
                config,
                dump_key,
                database,
                storage_location,
                reversible: reversible.then_some(true),
                pre_swap_hooks: non_empty(pre_swap_hooks),
                ..Default::default()
            };
            let restored = restore::run_restore_flow(&settings, args)
                .await
                .context("Restore failed")?;
            println!("{}", restored);
        }
        Commands::Ls {
            prefix,
            instances,
            databases,
            configs,
            local,
            database,
            storage_location,
            config,
        } => {
            let view = ListView::from_flags(instances, databases, configs, local)?;
            let args = OptionArgs {
                config,
                database,
                storage_location,
                ..Default::default()
            };
            for line in ls::run_ls_flow(&settings, args, prefix, view)
                .await
                .context("Listing failed")?
            {
                println!("{}", line);
            }
        }
        Commands::Copy {
            dump_key,
            database,
            config,
        } => {
            let args = OptionArgs {
                config,
                dump_key,
                database,
                ..Default::default()
            };
            let copied = copy::run_copy_flow(&settings, args)
                .await
                .context("Copy failed")?;
            println!("{}", copied);
        }
    }
    Ok(())
}
