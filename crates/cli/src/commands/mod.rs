use clap::{Args, Subcommand};
use std::path::PathBuf;
use taskmill_config::{CliOverrides, ConfigLoader, LoadedSettings};
use taskmill_core::{FailurePolicy, Result};

pub mod cache;
pub mod config;
pub mod run;

use self::cache::CacheCommands;
use self::config::ConfigCommands;

/// Options shared by every subcommand; they override the config file and env
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Path to a JSON config file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of commands running at once
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,

    /// What a failing command does to the rest of the batch
    #[arg(long, global = true, value_parser = ["isolate", "abort"])]
    pub policy: Option<String>,

    /// Bypass the result cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Location of the cache snapshot
    #[arg(long, global = true, value_name = "FILE")]
    pub cache_path: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Result<CliOverrides> {
        let failure_policy = self
            .policy
            .as_deref()
            .map(str::parse::<FailurePolicy>)
            .transpose()?;

        Ok(CliOverrides {
            concurrency: self.concurrency,
            failure_policy,
            cache_enabled: self.no_cache.then_some(false),
            cache_path: self.cache_path.clone(),
        })
    }

    /// Resolve the effective settings for this invocation
    pub fn load(&self) -> Result<LoadedSettings> {
        let mut loader = ConfigLoader::new().overrides(self.overrides()?);
        if let Some(path) = &self.config {
            loader = loader.config_file(path);
        }
        loader.load()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a JSON batch of commands
    Run {
        /// File holding a JSON array of commands, or `-` for stdin
        batch: PathBuf,
    },

    /// Inspect or modify the result cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

impl Commands {
    pub async fn execute(self, loaded: LoadedSettings) -> Result<()> {
        match self {
            Commands::Run { batch } => run::execute(&loaded.settings, &batch).await,
            Commands::Cache { command } => command.execute(&loaded.settings).await,
            Commands::Config { command } => command.execute(&loaded),
        }
    }
}
