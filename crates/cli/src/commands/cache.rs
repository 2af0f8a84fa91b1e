use clap::Subcommand;
use taskmill_cache::{CacheConfig, ResultCache};
use taskmill_config::Settings;
use taskmill_core::{Error, Result};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the keys of all live entries
    Keys,
    /// Print the value stored under a key
    Get { key: String },
    /// Remove one entry
    Delete { key: String },
    /// Clear all cache entries
    Clear,
    /// Drop expired entries and enforce the size limit
    Sweep,
}

impl CacheCommands {
    pub async fn execute(self, settings: &Settings) -> Result<()> {
        let cache = ResultCache::open(CacheConfig::from_settings(&settings.cache))?;
        let mutates = matches!(
            self,
            CacheCommands::Delete { .. } | CacheCommands::Clear | CacheCommands::Sweep
        );

        match self {
            CacheCommands::Stats { json } => {
                let stats = cache.stats();
                if json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    println!("{stats}");
                }
            }
            CacheCommands::Keys => {
                for key in cache.keys() {
                    println!("{key}");
                }
            }
            CacheCommands::Get { key } => {
                let value = cache
                    .get(&key)
                    .ok_or_else(|| Error::operation("cache get", format!("no live entry for '{key}'")))?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            CacheCommands::Delete { key } => {
                if cache.delete(&key).await {
                    tracing::info!(key = %key, "✓ Cache entry removed");
                } else {
                    tracing::info!(key = %key, "No cache entry to remove");
                }
            }
            CacheCommands::Clear => {
                cache.clear().await;
                tracing::info!("✓ Cache cleared successfully");
            }
            CacheCommands::Sweep => {
                let report = cache.sweep().await;
                tracing::info!(
                    expired = report.expired,
                    evicted = report.evicted,
                    "✓ Swept cache"
                );
            }
        }

        // surface write failures that the fail-open mutators only log
        if mutates {
            cache.flush().await?;
        }
        Ok(())
    }
}
