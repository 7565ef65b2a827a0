//! Command-line front end for a configured mount table.
//!
//! The mount layout and wrapper selection come from a JSON config file (see
//! `storewrap_mount_store::config`). Each invocation builds the table,
//! runs one command and exits; `memory` mounts do not outlive it.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use storewrap_backends::default_builders;
use storewrap_core::{BuilderTable, Bytes, StorageFactory};
use storewrap_mount_store::{ConfigError, MountError, MountTable, MountTableConfig};

/// storewrap - access storages mounted through the wrapper factory
#[derive(Parser, Debug)]
#[command(name = "storewrap")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Mount table config (defaults to <config dir>/storewrap/mounts.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List mounts as JSON
    Mounts,
    /// List registered wrappers in application order
    Wrappers,
    /// Print an object
    Read { path: String },
    /// Write an object
    Write { path: String, data: String },
    /// Remove an object
    Rm { path: String },
    /// List objects under a prefix
    Ls {
        #[arg(default_value = "/")]
        prefix: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("no config file given and no config directory found")]
    NoConfigDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error("nothing stored at '{path}'")]
    NotFound { path: String },

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Install the tracing subscriber on stderr.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("storewrap").join("mounts.json"))
}

/// Load the config, register its wrappers and mount everything.
pub fn open_table(config: &MountTableConfig) -> Result<MountTable<BuilderTable>, CliError> {
    let factory = Arc::new(StorageFactory::new(default_builders()));
    config.wrappers.register_into(&factory);
    Ok(MountTable::from_config(factory, config)?)
}

pub fn run(args: &Args, out: &mut impl Write) -> Result<(), CliError> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path().ok_or(CliError::NoConfigDir)?,
    };
    tracing::debug!(config = %config_path.display(), "loading mount table");
    let config = MountTableConfig::from_path(&config_path)?;
    let table = open_table(&config)?;

    match &args.command {
        Command::Mounts => {
            serde_json::to_writer_pretty(&mut *out, &table.list_mounts())?;
            writeln!(out)?;
        }
        Command::Wrappers => {
            for name in table.factory().registry().names() {
                writeln!(out, "{}", name)?;
            }
        }
        Command::Read { path } => match table.read(path)? {
            Some(data) => out.write_all(&data)?,
            None => return Err(CliError::NotFound { path: path.clone() }),
        },
        Command::Write { path, data } => {
            table.write(path, Bytes::from(data.clone()))?;
        }
        Command::Rm { path } => {
            if !table.remove(path)? {
                return Err(CliError::NotFound { path: path.clone() });
            }
        }
        Command::Ls { prefix } => {
            for path in table.list(prefix)? {
                writeln!(out, "{}", path)?;
            }
        }
    }
    Ok(())
}
